use super::registry::{default_model_for_category, ModelRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    pub is_image: bool,
    pub requested: Option<String>,
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

    /// An explicit model id wins and is passed through verbatim even when the
    /// registry does not know it; otherwise the category table decides.
    pub fn select(&self, requested: Option<&str>, category: &str) -> ModelSelection {
        let requested = requested
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let model = requested
            .clone()
            .unwrap_or_else(|| default_model_for_category(category).to_string());
        ModelSelection {
            is_image: self.registry.is_image_model(&model),
            model,
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IMAGE_MODEL;

    #[test]
    fn category_fallback_selects_text_model() {
        let selector = ModelSelector::default();
        let selection = selector.select(None, "coding");
        assert_eq!(selection.model, "gemini-2.0-flash");
        assert!(!selection.is_image);
        assert_eq!(selection.requested, None);
    }

    #[test]
    fn explicit_model_wins_over_category() {
        let selector = ModelSelector::default();
        let selection = selector.select(Some("claude-3-opus"), "coding");
        assert_eq!(selection.model, "claude-3-opus");
        assert_eq!(selection.requested.as_deref(), Some("claude-3-opus"));
    }

    #[test]
    fn image_model_is_flagged_for_dispatch() {
        let selector = ModelSelector::default();
        let selection = selector.select(Some(IMAGE_MODEL), "general");
        assert!(selection.is_image);
    }

    #[test]
    fn blank_request_falls_back_to_category() {
        let selector = ModelSelector::default();
        let selection = selector.select(Some("   "), "research");
        assert_eq!(selection.model, "claude-3-sonnet");
        assert_eq!(selection.requested, None);
    }
}
