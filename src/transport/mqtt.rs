//! MQTT-backed messenger.
//!
//! Each outbound message is published as JSON (`address`, `timestamp`, `types`,
//! `args`) to the topic `<ensemble><address>`, e.g. `arco/htclient/obj`.
//! Publishing uses QoS 0 and never waits on a full request queue, to keep the
//! fire-and-forget contract. A retained `<ensemble>/status` topic carries
//! `online`/`offline`. Connect and disconnect transitions are queued as status
//! notes and relayed by `Messenger::relay_status`.

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection, Event, Incoming, MqttOptions};
use rumqttc::Outgoing;
use rumqttc::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::message::OutboundMessage;
use crate::status::StatusSink;

use super::Messenger;

const STATUS_TOPIC_SUFFIX: &str = "status";
const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const REQUEST_QUEUE_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Parse `host:port`, `[v6]:port`, or a `mqtt://` / `mqtts://` url.
pub fn parse_mqtt_endpoint(addr: &str) -> Result<MqttEndpoint> {
    let mut use_tls = false;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port.parse().context("invalid MQTT port")?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port.parse().context("invalid MQTT port")?;
    Ok((host.to_string(), port))
}

/// Connection state changes seen by the event-loop thread.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LinkEvent {
    Up,
    Down(String),
}

/// Turns link events into status notes, one per transition.
struct LinkTracker {
    broker: String,
    connected: Option<bool>,
}

impl LinkTracker {
    fn new(broker: String) -> Self {
        Self {
            broker,
            connected: None,
        }
    }

    fn note(&mut self, event: &LinkEvent) -> Option<String> {
        match event {
            LinkEvent::Up if self.connected != Some(true) => {
                self.connected = Some(true);
                Some(format!("Connected to {}", self.broker))
            }
            LinkEvent::Down(reason) if self.connected != Some(false) => {
                self.connected = Some(false);
                Some(format!("Disconnected from {}: {}", self.broker, reason))
            }
            _ => None,
        }
    }
}

struct MqttRuntime {
    client: Client,
    closing: Arc<AtomicBool>,
    connection_handle: Option<std::thread::JoinHandle<()>>,
}

impl MqttRuntime {
    /// Polls the event loop on its own thread. rumqttc reconnects on the next
    /// poll after an error, so the loop only ends once our disconnect goes out
    /// or an error arrives after shutdown began.
    fn new(client: Client, mut connection: Connection, broker: String, notes: Sender<String>) -> Self {
        let closing = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&closing);
        let handle = std::thread::spawn(move || {
            let mut tracker = LinkTracker::new(broker);
            for event in connection.iter() {
                let link = match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => LinkEvent::Up,
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        log::warn!("MQTT connection error: {}", e);
                        LinkEvent::Down(e.to_string())
                    }
                };
                if let Some(note) = tracker.note(&link) {
                    let _ = notes.send(note);
                }
                if matches!(link, LinkEvent::Down(_)) {
                    std::thread::sleep(RECONNECT_DELAY);
                }
            }
        });

        Self {
            client,
            closing,
            connection_handle: Some(handle),
        }
    }

    fn disconnect(self) -> Result<()> {
        let MqttRuntime {
            client,
            closing,
            connection_handle,
        } = self;
        closing.store(true, Ordering::SeqCst);
        if let Err(e) = client.try_disconnect() {
            log::debug!("MQTT disconnect request not queued: {}", e);
        }
        if let Some(handle) = connection_handle {
            let _ = handle.join();
        }
        Ok(())
    }
}

pub struct MqttMessenger {
    endpoint: MqttEndpoint,
    client_id: String,
    ensemble: Option<String>,
    runtime: Option<MqttRuntime>,
    notes: Option<Receiver<String>>,
}

impl MqttMessenger {
    pub fn new(endpoint: MqttEndpoint, client_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            client_id: client_id.into(),
            ensemble: None,
            runtime: None,
            notes: None,
        }
    }

    fn status_topic(ensemble: &str) -> String {
        format!("{}/{}", ensemble, STATUS_TOPIC_SUFFIX)
    }
}

/// Topic a message is published on.
pub fn topic_for(ensemble: &str, address: &str) -> String {
    // `!service/node` addresses name the service directly.
    match address.strip_prefix('!') {
        Some(rest) => format!("{}/{}", ensemble, rest),
        None => format!("{}{}", ensemble, address),
    }
}

impl Messenger for MqttMessenger {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn initialize(&mut self, ensemble: &str, status: &mut dyn StatusSink) -> Result<()> {
        if self.runtime.is_some() {
            return Err(anyhow!("MQTT messenger already initialized"));
        }
        let mut options =
            MqttOptions::new(&self.client_id, &self.endpoint.host, self.endpoint.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_start(true);
        if self.endpoint.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let broker = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let (client, connection) = Client::new(options, REQUEST_QUEUE_CAPACITY);
        let (notes_tx, notes_rx) = mpsc::channel();
        let runtime = MqttRuntime::new(client, connection, broker.clone(), notes_tx);
        runtime
            .client
            .try_publish(
                Self::status_topic(ensemble),
                QoS::AtLeastOnce,
                true,
                PAYLOAD_ONLINE.as_bytes().to_vec(),
            )
            .context("publish MQTT online status")?;

        log::info!(
            "MQTT messenger connecting to {} for ensemble {}",
            broker,
            ensemble
        );
        status.notify(&format!("Connecting to {} as {}", broker, ensemble));
        self.ensemble = Some(ensemble.to_string());
        self.runtime = Some(runtime);
        self.notes = Some(notes_rx);
        Ok(())
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let (Some(runtime), Some(ensemble)) = (self.runtime.as_ref(), self.ensemble.as_deref())
        else {
            return Err(anyhow!("MQTT messenger used before initialize"));
        };
        let payload = serde_json::to_vec(message)?;
        // Never block the tick: a full request queue is a failed send.
        runtime
            .client
            .try_publish(
                topic_for(ensemble, message.address()),
                QoS::AtMostOnce,
                false,
                payload,
            )
            .with_context(|| format!("publish {}", message.address()))?;
        Ok(())
    }

    fn relay_status(&mut self, status: &mut dyn StatusSink) {
        let Some(notes) = self.notes.as_ref() else {
            return;
        };
        while let Ok(note) = notes.try_recv() {
            status.notify(&note);
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.notes = None;
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        if let Some(ensemble) = self.ensemble.as_deref() {
            if let Err(e) = runtime.client.try_publish(
                Self::status_topic(ensemble),
                QoS::AtLeastOnce,
                true,
                PAYLOAD_OFFLINE.as_bytes().to_vec(),
            ) {
                log::warn!("failed to publish MQTT offline status: {}", e);
            }
        }
        runtime.disconnect()
    }
}
