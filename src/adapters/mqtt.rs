//! MQTT publisher adapter.
//!
//! Wraps a synchronous `rumqttc` client.  [`MqttPublisher::connect`]
//! spawns a named thread that drives the client's network event loop for
//! the process lifetime; [`PublishPort::publish`] only enqueues, so the
//! publication loop never blocks on the network.

use std::io;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{Client, ClientError, Connection, Event, MqttOptions, Packet, QoS};

use crate::app::ports::PublishPort;
use crate::error::PublishError;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Outgoing request queue depth.  At one message per group per second a
/// full queue means the broker has been unreachable for a while.
const QUEUE_CAPACITY: usize = 64;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

pub struct MqttPublisher {
    client: Client,
}

impl MqttPublisher {
    /// Create the client and start its network thread.  The first
    /// connection attempt happens on that thread; failures there are
    /// retried with a back-off and never surface here.
    pub fn connect(broker: &str, port: u16, client_id: &str) -> io::Result<Self> {
        let mut options = MqttOptions::new(client_id, broker, port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, connection) = Client::new(options, QUEUE_CAPACITY);

        let endpoint = format!("{broker}:{port}");
        thread::Builder::new()
            .name("mqtt-net".into())
            .spawn(move || drive(connection, &endpoint))?;

        Ok(Self { client })
    }
}

/// Run the event loop until the client is dropped.
fn drive(mut connection: Connection, endpoint: &str) {
    info!("MQTT: connecting to {}", endpoint);
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("MQTT: connected to {}", endpoint),
            Ok(event) => debug!("MQTT: {:?}", event),
            Err(e) => {
                warn!("MQTT: {} ({}), retrying in {:?}", e, endpoint, RECONNECT_BACKOFF);
                thread::sleep(RECONNECT_BACKOFF);
            }
        }
    }
    info!("MQTT: event loop finished");
}

impl PublishPort for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| match e {
                ClientError::TryRequest(_) => PublishError::QueueFull,
                ClientError::Request(_) => PublishError::Disconnected,
            })
    }
}
