//! sensett: main entry point
//!
//! Hexagonal architecture with two periodic loops over shared sensor state.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  i2c::open_sensor  HttpFanActuator  MqttPublisher  FileConfig  │
//! │  (SensorPort)      (ActuatorPort)   (PublishPort)  (ConfigPort)│
//! │  LogEventSink (EventSink)                                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────┐        ┌──────────────────────┐      │
//! │  │   AcquisitionLoop    │ writes │   PublicationLoop    │      │
//! │  │ sample · smooth · fan│──────▶ │ snapshot · publish   │      │
//! │  └──────────────────────┘ reg.   └──────────────────────┘      │
//! │                                                                │
//! │  Schedule (fixed-rate) · scoped threads borrowing the registry │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow};
use log::{error, info};
use tracing_subscriber::EnvFilter;

use sensett::adapters::config_file::FileConfig;
use sensett::adapters::http_fan::HttpFanActuator;
use sensett::adapters::i2c;
use sensett::adapters::log_sink::LogEventSink;
use sensett::adapters::mqtt::MqttPublisher;
use sensett::app::pipeline::Pipeline;
use sensett::app::ports::{ConfigPort, EventSink};
use sensett::config::SystemConfig;
use sensett::scheduler::{Schedule, spawn_loop};

// ── Logging ───────────────────────────────────────────────────
//
// Call sites use the `log` facade; the fmt subscriber's log bridge picks
// those records up.  `RUST_LOG` wins over the config file's LOG_LEVEL.

fn init_logging(config: &SystemConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid LOG_LEVEL '{}'", config.log_level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow!("logger init failed: {e}"))
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Configuration (fatal on any error) ─────────────────
    let source = FileConfig::from_env();
    let config = source
        .load()
        .with_context(|| format!("loading {}", source.path().display()))?;

    init_logging(&config)?;
    info!("sensett v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Sensors, groups, compensation, fan rule ────────────
    let pipeline = Pipeline::build(&config, i2c::open_sensor).context("startup failed")?;

    // ── 3. Outbound adapters ──────────────────────────────────
    let client_id = format!("sensett-{}", std::process::id());
    let publisher = MqttPublisher::connect(&config.mqtt_broker, config.mqtt_port, &client_id)
        .context("cannot start MQTT client")?;
    let actuator = HttpFanActuator::new(config.fan_control_url.clone(), config.fan_timeout());

    LogEventSink::new().emit(&pipeline.started_event());

    // ── 4. Loops ──────────────────────────────────────────────
    let acquisition_schedule = Schedule::periodic("acquisition", config.acquisition_interval());
    let publication_schedule = Schedule::periodic("publication", config.publish_interval())
        .with_initial_delay(config.publish_warmup());

    // Cleared when either loop exits or fails to start, which stops the
    // other one.  Normally the daemon runs until the process is terminated.
    let running = AtomicBool::new(true);

    thread::scope(|s| -> Result<()> {
        let mut acquisition = pipeline.acquisition(actuator);
        let mut publication = pipeline.publication(publisher);
        let running = &running;

        let acq = spawn_loop(s, "acquisition", move || {
            let mut sink = LogEventSink::new();
            acquisition_schedule.run(running, || {
                acquisition.tick(&mut sink);
            })
        })?;
        let publ = spawn_loop(s, "publication", move || {
            let mut sink = LogEventSink::new();
            publication_schedule.run(running, || {
                publication.tick(&mut sink);
            })
        })
        .inspect_err(|_| running.store(false, Ordering::Release))?;

        let mut failed = Vec::new();
        for (name, handle) in [("acquisition", acq), ("publication", publ)] {
            match handle.join() {
                Ok(ticks) => info!("{} loop exited after {} ticks", name, ticks),
                Err(_) => {
                    error!("{} loop panicked", name);
                    failed.push(name);
                }
            }
        }
        if failed.is_empty() {
            Err(anyhow!("pipeline loops stopped"))
        } else {
            Err(anyhow!("{} loop panicked", failed.join(", ")))
        }
    })
}
