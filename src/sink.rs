//! Per-tick output: publish each prediction, then render the overlay.

use anyhow::Result;

use crate::detect::{HandModel, Prediction};
use crate::frame::{Canvas, Frame};
use crate::message::OutboundMessage;
use crate::transport::Messenger;

/// Result of publishing one batch. Sends are best-effort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct Sink {
    messenger: Box<dyn Messenger>,
    address: String,
    canvas: Canvas,
}

impl Sink {
    pub fn new(messenger: Box<dyn Messenger>, address: impl Into<String>, canvas: Canvas) -> Self {
        Self {
            messenger,
            address: address.into(),
            canvas,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// One message per prediction, in input order. A failed send is logged and
    /// counted; the rest of the batch still goes out.
    pub fn publish(&mut self, predictions: &[Prediction]) -> PublishReport {
        let mut report = PublishReport::default();
        for prediction in predictions {
            let outcome = OutboundMessage::for_prediction(&self.address, prediction)
                .and_then(|message| self.messenger.send(&message));
            match outcome {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::warn!(
                        "send to {} via {} failed: {:#}",
                        self.address,
                        self.messenger.name(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Delegate drawing to the model, on a canvas sized to the frame.
    pub fn render(
        &mut self,
        model: &dyn HandModel,
        predictions: &[Prediction],
        frame: &Frame,
    ) -> Result<()> {
        self.canvas.fit_to(frame);
        model.render_predictions(predictions, &mut self.canvas, frame)
    }

    pub(crate) fn messenger_mut(&mut self) -> &mut dyn Messenger {
        self.messenger.as_mut()
    }
}
