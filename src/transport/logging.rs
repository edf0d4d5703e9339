use anyhow::{anyhow, Result};

use crate::message::{O2Arg, OutboundMessage};
use crate::status::StatusSink;

use super::Messenger;

/// Messenger that writes each message to the log instead of a network.
#[derive(Debug, Default)]
pub struct LogMessenger {
    ensemble: Option<String>,
    sent: u64,
}

impl LogMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Messenger for LogMessenger {
    fn name(&self) -> &'static str {
        "log"
    }

    fn initialize(&mut self, ensemble: &str, status: &mut dyn StatusSink) -> Result<()> {
        self.ensemble = Some(ensemble.to_string());
        status.notify(&format!("Logging messages for ensemble {}", ensemble));
        Ok(())
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let ensemble = self
            .ensemble
            .as_deref()
            .ok_or_else(|| anyhow!("log messenger used before initialize"))?;
        log::info!(
            "{}{} @{} {} [{}]",
            ensemble,
            message.address(),
            message.timestamp(),
            message.types(),
            format_args_list(message.args())
        );
        self.sent += 1;
        Ok(())
    }
}

fn format_args_list(args: &[O2Arg]) -> String {
    args.iter()
        .map(|arg| match arg {
            O2Arg::Int32(v) => v.to_string(),
            O2Arg::Float(v) => format!("{:.3}", v),
            O2Arg::Double(v) => format!("{:.3}", v),
            O2Arg::Str(v) => format!("{:?}", v),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
