mod backend;
mod backends;
mod params;
mod result;

pub use backend::{HandModel, ModelLoader, OVERLAY_COLOR};
pub use backends::{ScriptedLoader, ScriptedModel, SyntheticHandModel, SyntheticLoader};
pub use params::ModelParams;
pub use result::{label_for_class, BBox, Prediction};
