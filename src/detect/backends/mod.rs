pub mod scripted;
pub mod synthetic;

pub use scripted::{ScriptedLoader, ScriptedModel};
pub use synthetic::{SyntheticHandModel, SyntheticLoader};
