use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::detect::backend::{HandModel, ModelLoader};
use crate::detect::params::ModelParams;
use crate::detect::result::Prediction;
use crate::frame::Frame;

enum Step {
    Batch(Vec<Prediction>),
    Fail(String),
}

/// Model that plays back a queued script of results, one per `detect` call.
///
/// Once the script runs out every call returns an empty batch.
pub struct ScriptedModel {
    script: VecDeque<Step>,
    calls: Arc<AtomicU64>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_batch(mut self, predictions: Vec<Prediction>) -> Self {
        self.script.push_back(Step::Batch(predictions));
        self
    }

    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.script.push_back(Step::Fail(message.into()));
        self
    }

    /// Shared count of `detect` calls, still readable after the model is moved into a loop.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.calls)
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl HandModel for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Step::Batch(predictions)) => Ok(predictions),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Loader handing out a prepared `ScriptedModel` exactly once.
pub struct ScriptedLoader {
    model: Option<ScriptedModel>,
    failure: Option<String>,
    last_params: Option<ModelParams>,
}

impl ScriptedLoader {
    pub fn new(model: ScriptedModel) -> Self {
        Self {
            model: Some(model),
            failure: None,
            last_params: None,
        }
    }

    /// A loader whose `load` always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            model: None,
            failure: Some(message.into()),
            last_params: None,
        }
    }

    /// Parameters seen by the most recent `load` call.
    pub fn last_params(&self) -> Option<&ModelParams> {
        self.last_params.as_ref()
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&mut self, params: &ModelParams) -> Result<Box<dyn HandModel>> {
        self.last_params = Some(params.clone());
        if let Some(message) = &self.failure {
            return Err(anyhow!("{}", message));
        }
        params.validate()?;
        let model = self
            .model
            .take()
            .ok_or_else(|| anyhow!("scripted model already loaded"))?;
        Ok(Box::new(model))
    }
}
