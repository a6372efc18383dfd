//! MQTT link adapter: implements [`MessagingPort`] with `rumqttc`.
//!
//! `connect` builds a client and hands its connection to a worker thread.
//! The worker drives the protocol and reports back through the event queue:
//!
//! | Notification                | Event posted                        |
//! |-----------------------------|-------------------------------------|
//! | CONNACK accepted            | `Connectivity(Connected)`           |
//! | CONNACK refused (code 1–5)  | `Connectivity(Errored(code))`       |
//! | I/O error before CONNACK    | `Connectivity(Errored(-1))`         |
//! | I/O error after CONNACK     | `Connectivity(Disconnected)`        |
//! | Incoming PUBLISH            | `RemoteMessage { topic, payload }`  |
//!
//! The worker stops after the first failure; it never reconnects on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{
    Client, ConnectReturnCode, Connection, ConnectionError, Event as MqttEvent, MqttOptions,
    Outgoing, Packet, QoS,
};

use crate::app::ports::{LinkSettings, MessagingPort};
use crate::error::LinkError;
use crate::events::{Event, EventSender};
use crate::fsm::context::ConnectivityState;
use crate::topics::REJECT_COMMAND_TOPIC;

/// Capacity of the client request channel.
const REQUEST_CAP: usize = 16;

/// Flags shared between the adapter and its worker.
#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    closing: AtomicBool,
}

/// Broker link backed by a `rumqttc` client and a worker thread.
pub struct MqttLink {
    events: EventSender,
    client: Option<Client>,
    flags: Arc<LinkFlags>,
    worker: Option<JoinHandle<()>>,
}

impl MqttLink {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            client: None,
            flags: Arc::new(LinkFlags::default()),
            worker: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::Acquire)
    }

    /// Tear down the current client, if any, and wait for its worker.
    fn close(&mut self) {
        self.flags.closing.store(true, Ordering::Release);
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                debug!("MQTT: disconnect request not queued: {}", e);
            }
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("MQTT: worker thread panicked");
            }
        }
        self.flags.connected.store(false, Ordering::Release);
    }
}

impl MessagingPort for MqttLink {
    fn connect(&mut self, settings: &LinkSettings) -> Result<(), LinkError> {
        self.close();

        let mut options = MqttOptions::new(
            settings.client_id.as_str(),
            settings.broker.as_str(),
            settings.port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(settings.keepalive_secs)));
        options.set_clean_session(true);

        let (client, connection) = Client::new(options, REQUEST_CAP);
        let flags = Arc::new(LinkFlags::default());
        let worker = {
            let client = client.clone();
            let flags = Arc::clone(&flags);
            let events = self.events.clone();
            thread::Builder::new()
                .name("mqtt-link".into())
                .spawn(move || drive(connection, client, flags, events))
                .map_err(|e| LinkError::Connect(e.to_string()))?
        };

        info!(
            "MQTT: connecting to {}:{} (keepalive {}s)",
            settings.broker, settings.port, settings.keepalive_secs
        );
        self.client = Some(client);
        self.flags = flags;
        self.worker = Some(worker);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        let client = self.client.as_ref().ok_or(LinkError::NotConnected)?;
        if !self.flags.connected.load(Ordering::Acquire) {
            return Err(LinkError::NotConnected);
        }
        client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| LinkError::Client(e.to_string()))
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        if self.client.is_some() {
            info!("MQTT: disconnecting");
        }
        self.close();
        Ok(())
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Worker ───────────────────────────────────────────────────

fn drive(mut connection: Connection, client: Client, flags: Arc<LinkFlags>, events: EventSender) {
    for notification in connection.iter() {
        match notification {
            Ok(MqttEvent::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    report_refusal(&events, ack.code);
                    break;
                }
                info!("MQTT: connected");
                flags.connected.store(true, Ordering::Release);
                if let Err(e) = client.try_subscribe(REJECT_COMMAND_TOPIC, QoS::AtLeastOnce) {
                    warn!("MQTT: subscribe to '{}' failed: {}", REJECT_COMMAND_TOPIC, e);
                }
                events.post(Event::Connectivity(ConnectivityState::Connected));
            }
            Ok(MqttEvent::Incoming(Packet::SubAck(_))) => {
                debug!("MQTT: subscribed to '{}'", REJECT_COMMAND_TOPIC);
            }
            Ok(MqttEvent::Incoming(Packet::Publish(publish))) => {
                events.post(Event::RemoteMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(MqttEvent::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT: disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                report_refusal(&events, code);
                break;
            }
            Err(e) => {
                if flags.closing.load(Ordering::Acquire) {
                    break;
                }
                let state = if flags.connected.load(Ordering::Acquire) {
                    warn!("MQTT: connection lost: {}", e);
                    ConnectivityState::Disconnected
                } else {
                    warn!("MQTT: connection failed: {}", e);
                    ConnectivityState::Errored(ConnectivityState::TRANSPORT_FAILURE)
                };
                flags.connected.store(false, Ordering::Release);
                events.post(Event::Connectivity(state));
                break;
            }
        }
    }
    flags.connected.store(false, Ordering::Release);
    debug!("MQTT: worker exiting");
}

fn report_refusal(events: &EventSender, code: ConnectReturnCode) {
    let code = refusal_code(code);
    warn!("MQTT: broker refused connection (code {})", code);
    events.post(Event::Connectivity(ConnectivityState::Errored(code)));
}

/// CONNACK return code as sent on the wire.
fn refusal_code(code: ConnectReturnCode) -> i32 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}
