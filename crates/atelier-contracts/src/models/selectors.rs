use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Picks `requested` when it exists and supports `capability`, otherwise `default`, otherwise
    /// the first capable model. Any substitution records why it happened.
    pub fn select(
        &self,
        requested: Option<&str>,
        default: &str,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let mut fallback_reason = None;
        if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            fallback_reason = Some(format!(
                "Requested model '{requested_value}' unavailable for capability '{capability}'."
            ));
        }

        if let Some(model) = self.registry.ensure(default, capability) {
            return Ok(ModelSelection {
                model,
                requested: requested.map(str::to_string),
                fallback_reason,
            });
        }

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: fallback_reason.or_else(|| {
                Some(format!(
                    "Default model '{default}' unavailable for capability '{capability}'."
                ))
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;

    fn text_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "gemini".to_string(),
            capabilities: vec!["text".to_string()],
            context_window: None,
            paid: false,
        }
    }

    #[test]
    fn honours_capable_request() {
        let selection = ModelSelector::default()
            .select(Some("gemini-2.5-pro"), "gemini-3-pro-preview", "thinking")
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-pro");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn falls_back_to_default_with_reason() {
        let selection = ModelSelector::default()
            .select(Some("veo-3.1-generate-preview"), "gemini-2.5-flash", "text")
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'veo-3.1-generate-preview' unavailable for capability 'text'.")
        );
    }

    #[test]
    fn blank_request_is_treated_as_absent() {
        let selection = ModelSelector::default()
            .select(Some("  "), "gemini-2.5-flash", "text")
            .unwrap();
        assert!(selection.requested.is_none());
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn first_capable_model_when_default_missing() {
        let mut models = IndexMap::new();
        models.insert("only-text".to_string(), text_model("only-text"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, "gone", "text")
            .unwrap();
        assert_eq!(selection.model.name, "only-text");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Default model 'gone' unavailable for capability 'text'.")
        );
    }

    #[test]
    fn errors_when_nothing_supports_capability() {
        let mut models = IndexMap::new();
        models.insert("only-text".to_string(), text_model("only-text"));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, "only-text", "video")
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'video'.");
    }
}
