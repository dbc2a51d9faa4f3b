mod registry;
mod roster;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, CAP_EDIT, CAP_IMAGE, CAP_SEARCH, CAP_TEXT, CAP_THINKING, CAP_VIDEO,
    CAP_VISION,
};
pub use roster::{ModelRole, ModelRoster};
pub use selectors::{ModelSelection, ModelSelector};
