use indexmap::IndexMap;

pub const CAP_TEXT: &str = "text";
pub const CAP_VISION: &str = "vision";
pub const CAP_IMAGE: &str = "image";
pub const CAP_EDIT: &str = "edit";
pub const CAP_VIDEO: &str = "video";
pub const CAP_THINKING: &str = "thinking";
pub const CAP_SEARCH: &str = "search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
    /// Operations on this model need a paid (billing-enabled) key.
    pub paid: bool,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim().trim_start_matches("models/"))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert =
        |name: &str, capabilities: &[&str], context_window: Option<u64>, paid: bool| {
            map.insert(
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: "gemini".to_string(),
                    capabilities: capabilities
                        .iter()
                        .map(|item| (*item).to_string())
                        .collect(),
                    context_window,
                    paid,
                },
            );
        };

    insert(
        "gemini-2.5-flash",
        &[CAP_TEXT, CAP_VISION, CAP_SEARCH],
        Some(1_048_576),
        false,
    );
    insert(
        "gemini-3-pro-preview",
        &[CAP_TEXT, CAP_VISION, CAP_SEARCH, CAP_THINKING],
        Some(1_048_576),
        false,
    );
    insert(
        "gemini-2.5-pro",
        &[CAP_TEXT, CAP_VISION, CAP_SEARCH, CAP_THINKING],
        Some(1_048_576),
        false,
    );
    insert("gemini-3-pro-image-preview", &[CAP_IMAGE, CAP_EDIT], None, true);
    insert("gemini-2.5-flash-image", &[CAP_EDIT, CAP_IMAGE], None, false);
    insert("veo-3.1-fast-generate-preview", &[CAP_VIDEO], None, true);
    insert("veo-3.1-generate-preview", &[CAP_VIDEO], None, true);

    map
}
