use std::collections::BTreeMap;

use super::registry::{
    ModelSpec, CAP_EDIT, CAP_IMAGE, CAP_TEXT, CAP_THINKING, CAP_VIDEO, CAP_VISION,
};
use super::selectors::ModelSelector;

/// The model slots each studio operation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelRole {
    ChatFast,
    ChatSmart,
    ImagePro,
    ImageEdit,
    VideoFast,
    VideoHq,
}

impl ModelRole {
    pub const ALL: [ModelRole; 6] = [
        ModelRole::ChatFast,
        ModelRole::ChatSmart,
        ModelRole::ImagePro,
        ModelRole::ImageEdit,
        ModelRole::VideoFast,
        ModelRole::VideoHq,
    ];

    pub fn default_model(self) -> &'static str {
        match self {
            ModelRole::ChatFast => "gemini-2.5-flash",
            ModelRole::ChatSmart => "gemini-3-pro-preview",
            ModelRole::ImagePro => "gemini-3-pro-image-preview",
            ModelRole::ImageEdit => "gemini-2.5-flash-image",
            ModelRole::VideoFast => "veo-3.1-fast-generate-preview",
            ModelRole::VideoHq => "veo-3.1-generate-preview",
        }
    }

    pub fn capability(self) -> &'static str {
        match self {
            ModelRole::ChatFast => CAP_TEXT,
            ModelRole::ChatSmart => CAP_THINKING,
            ModelRole::ImagePro => CAP_IMAGE,
            ModelRole::ImageEdit => CAP_EDIT,
            ModelRole::VideoFast | ModelRole::VideoHq => CAP_VIDEO,
        }
    }

    /// Analysis runs on the smart tier and must accept image parts too.
    pub fn also_requires(self) -> Option<&'static str> {
        match self {
            ModelRole::ChatSmart => Some(CAP_VISION),
            _ => None,
        }
    }

    pub fn env_key(self) -> &'static str {
        match self {
            ModelRole::ChatFast => "ATELIER_CHAT_FAST_MODEL",
            ModelRole::ChatSmart => "ATELIER_CHAT_SMART_MODEL",
            ModelRole::ImagePro => "ATELIER_IMAGE_MODEL",
            ModelRole::ImageEdit => "ATELIER_EDIT_MODEL",
            ModelRole::VideoFast => "ATELIER_VIDEO_MODEL",
            ModelRole::VideoHq => "ATELIER_VIDEO_HQ_MODEL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRoster {
    models: BTreeMap<ModelRole, ModelSpec>,
    fallback_reasons: Vec<String>,
}

impl ModelRoster {
    pub fn resolve(
        selector: &ModelSelector,
        overrides: &BTreeMap<ModelRole, String>,
    ) -> Result<Self, String> {
        let mut models = BTreeMap::new();
        let mut fallback_reasons = Vec::new();
        for role in ModelRole::ALL {
            let requested = overrides.get(&role).map(String::as_str);
            let selection = selector.select(requested, role.default_model(), role.capability())?;
            if let Some(extra) = role.also_requires() {
                if !selection.model.supports(extra) {
                    return Err(format!(
                        "Model '{}' cannot serve {role:?}: missing capability '{extra}'.",
                        selection.model.name
                    ));
                }
            }
            if let Some(reason) = selection.fallback_reason {
                fallback_reasons.push(reason);
            }
            models.insert(role, selection.model);
        }
        Ok(Self {
            models,
            fallback_reasons,
        })
    }

    pub fn defaults() -> Self {
        Self::resolve(&ModelSelector::default(), &BTreeMap::new())
            .unwrap_or_else(|_| unreachable!("built-in registry covers every role"))
    }

    pub fn get(&self, role: ModelRole) -> &ModelSpec {
        &self.models[&role]
    }

    pub fn name(&self, role: ModelRole) -> &str {
        &self.get(role).name
    }

    pub fn fallback_reasons(&self) -> &[String] {
        &self.fallback_reasons
    }
}
