//! Outbound messaging.
//!
//! The `Messenger` trait is the boundary to the publish-style messaging layer.
//! Sends are fire-and-forget: an `Ok` means the message was handed off, not
//! that anyone received it.

mod logging;
mod memory;
pub mod mqtt;

use anyhow::Result;

use crate::message::OutboundMessage;
use crate::status::StatusSink;

pub use logging::LogMessenger;
pub use memory::MemoryMessenger;
pub use mqtt::{parse_mqtt_endpoint, MqttEndpoint, MqttMessenger};

pub trait Messenger: Send {
    /// Transport identifier.
    fn name(&self) -> &'static str;

    /// One-time setup: join `ensemble`. Connection progress may be reported on `status`.
    fn initialize(&mut self, ensemble: &str, status: &mut dyn StatusSink) -> Result<()>;

    /// Hand one message to the transport.
    fn send(&mut self, message: &OutboundMessage) -> Result<()>;

    /// Forward connection notes gathered since the last call. Called on the
    /// driver thread before each batch is published.
    fn relay_status(&mut self, _status: &mut dyn StatusSink) {}

    /// Release the transport. Called once at the end of a session.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
