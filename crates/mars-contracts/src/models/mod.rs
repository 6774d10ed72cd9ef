mod registry;
mod selectors;

pub use registry::{default_model_for_category, ModelRegistry, ModelSpec, IMAGE_MODEL};
pub use selectors::{ModelSelection, ModelSelector};
