//! HTTP fan actuator.
//!
//! Switches a printer-controlled fan by POSTing a G-code script to the
//! printer's control API:
//!
//! ```text
//! POST /printer/gcode/script
//! {"script": "SET_FAN_SPEED FAN=exhaust SPEED=1.0"}
//! ```
//!
//! Every request is bounded by the agent timeout, so a hung endpoint
//! delays at most one acquisition tick.

use std::time::Duration;

use log::debug;
use serde_json::json;

use crate::app::ports::ActuatorPort;
use crate::control::FanState;
use crate::error::ActuatorError;

pub fn gcode_script(fan: &str, state: FanState) -> String {
    format!("SET_FAN_SPEED FAN={} SPEED={}", fan, state.speed_arg())
}

pub struct HttpFanActuator {
    agent: ureq::Agent,
    url: String,
}

impl HttpFanActuator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("sensett/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            url: url.into(),
        }
    }
}

impl ActuatorPort for HttpFanActuator {
    fn set_state(&mut self, fan: &str, state: FanState) -> Result<(), ActuatorError> {
        let body = json!({ "script": gcode_script(fan, state) }).to_string();
        debug!("POST {} {}", self.url, body);

        match self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
            Ok(resp) => Err(ActuatorError::Status(resp.status())),
            Err(ureq::Error::Status(code, _)) => Err(ActuatorError::Status(code)),
            Err(ureq::Error::Transport(e)) => Err(ActuatorError::Transport(e.to_string())),
        }
    }
}
