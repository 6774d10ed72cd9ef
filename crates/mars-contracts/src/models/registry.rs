use indexmap::IndexMap;

/// Model id of the image backend. Anything else routes to the text endpoint.
pub const IMAGE_MODEL: &str = "stable-diffusion-xl-1024-v1-0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub label: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    pub fn is_image(&self) -> bool {
        self.supports("image")
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.get(id)
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

    /// Whether `id` names the image backend. Unknown ids route to the text
    /// endpoint, so only the registered image capability matters here.
    pub fn is_image_model(&self, id: &str) -> bool {
        self.models
            .get(id)
            .map(ModelSpec::is_image)
            .unwrap_or(id == IMAGE_MODEL)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Category -> default model table used when no explicit model is requested.
pub fn default_model_for_category(category: &str) -> &'static str {
    match category {
        "coding" => "gemini-2.0-flash",
        "research" => "claude-3-sonnet",
        "creative" => "claude-3-opus",
        _ => "gemini-2.0-flash",
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, label: &str, description: &str, capabilities: &[&str]| {
        map.insert(
            id.to_string(),
            ModelSpec {
                id: id.to_string(),
                label: label.to_string(),
                description: description.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert(
        "gemini-2.0-flash",
        "Fast & Precise",
        "Quick responses with high accuracy",
        &["text", "coding", "general", "technical"],
    );
    insert(
        "claude-3-opus",
        "Creative & Detailed",
        "Rich, creative responses with deep analysis",
        &["text", "creative", "research", "writing"],
    );
    insert(
        "claude-3-sonnet",
        "Research & Analysis",
        "In-depth research and analytical responses",
        &["text", "research", "analysis", "academic"],
    );
    insert(
        IMAGE_MODEL,
        "Image Generation",
        "Custom images and graphics from a text prompt",
        &["image"],
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_table_matches_fixed_mapping() {
        assert_eq!(default_model_for_category("coding"), "gemini-2.0-flash");
        assert_eq!(default_model_for_category("research"), "claude-3-sonnet");
        assert_eq!(default_model_for_category("creative"), "claude-3-opus");
        assert_eq!(default_model_for_category("general"), "gemini-2.0-flash");
        assert_eq!(default_model_for_category("anything"), "gemini-2.0-flash");
    }

    #[test]
    fn registry_flags_only_the_image_model() {
        let registry = ModelRegistry::default();
        assert!(registry.is_image_model(IMAGE_MODEL));
        assert!(!registry.is_image_model("gemini-2.0-flash"));
        assert!(!registry.is_image_model("claude-3-opus"));
        // Unknown ids are assumed to be text models.
        assert!(!registry.is_image_model("some-future-model"));
    }

    #[test]
    fn capability_query_returns_text_models() {
        let registry = ModelRegistry::default();
        let text = registry.by_capability("text");
        assert_eq!(text.len(), 3);
        assert!(text.iter().all(|model| !model.is_image()));
        let image = registry.by_capability("image");
        assert_eq!(image.len(), 1);
        assert_eq!(image[0].id, IMAGE_MODEL);
    }
}
