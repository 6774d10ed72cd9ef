use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mars_contracts::models::ModelSelector;
use mars_contracts::params::GenerationParams;

use crate::api::ApiClient;

/// Fixed textual output recorded for a successful image generation.
pub const IMAGE_CONFIRMATION: &str = "Image generated successfully.";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub category: String,
    pub params: GenerationParams,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptData {
    pub name: String,
    pub description: String,
    pub content: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Image result: the backend usually returns a URL, but a base64 payload is
/// accepted in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Url(String),
    Bytes(Vec<u8>),
}

impl ImagePayload {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImagePayload::Url(url) => Some(url),
            ImagePayload::Bytes(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Text { model: String, content: String },
    Image { model: String, image: ImagePayload },
}

impl GenerationOutcome {
    pub fn model(&self) -> &str {
        match self {
            GenerationOutcome::Text { model, .. } | GenerationOutcome::Image { model, .. } => model,
        }
    }

    /// The text recorded in the session history: the generated content, or
    /// the fixed confirmation for images.
    pub fn output_text(&self) -> &str {
        match self {
            GenerationOutcome::Text { content, .. } => content,
            GenerationOutcome::Image { .. } => IMAGE_CONFIRMATION,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Text { .. } => None,
            GenerationOutcome::Image { image, .. } => image.url(),
        }
    }
}

/// Dispatches a prompt to the text or image endpoint depending on the
/// resolved model. One round trip per call; no retries, no cancellation.
pub struct GenerationService<'a> {
    api: &'a ApiClient,
    selector: ModelSelector,
}

impl<'a> GenerationService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self {
            api,
            selector: ModelSelector::default(),
        }
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let Some(prompt) = non_empty_prompt(&request.prompt) else {
            bail!("prompt must not be empty");
        };
        let selection = self
            .selector
            .select(request.model.as_deref(), &request.category);
        let payload = generation_payload(prompt, &selection.model, request.params);

        if selection.is_image {
            let response = self.api.post_image_json("generations", &payload)?;
            let image = parse_image_generation(&response)?;
            Ok(GenerationOutcome::Image {
                model: selection.model,
                image,
            })
        } else {
            let response = self.api.post_json("generations", &payload)?;
            let content = parse_text_generation(&response)?;
            Ok(GenerationOutcome::Text {
                model: selection.model,
                content,
            })
        }
    }

    /// Flattens a role-prefixed transcript into one prompt for the text
    /// endpoint, the way the original chat view did.
    pub fn chat_transcript(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String> {
        let prompt = flatten_transcript(messages);
        if prompt.trim().is_empty() {
            bail!("transcript must not be empty");
        }
        let payload = generation_payload(&prompt, "gemini-2.0-flash", params);
        let response = self.api.post_json("generations", &payload)?;
        parse_text_generation(&response)
    }

    /// Dispatches a stored prompt by id with the category's default model.
    pub fn generate_from_prompt(
        &self,
        prompt_id: &str,
        category: &str,
        params: GenerationParams,
    ) -> Result<String> {
        let selection = self.selector.select(None, category);
        let payload = generation_payload(prompt_id, &selection.model, params);
        let response = self.api.post_json("generations", &payload)?;
        parse_text_generation(&response)
    }

    pub fn list_generations(&self, page: u32, limit: u32) -> Result<Value> {
        self.api.get_json(
            "generations",
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
    }

    pub fn get_generation(&self, id: &str) -> Result<Value> {
        self.api.get_json(&format!("generations/{id}"), &[])
    }

    pub fn create_prompt(&self, data: &PromptData) -> Result<Value> {
        self.api.post_json("prompts", &serde_json::to_value(data)?)
    }

    pub fn list_prompts(&self, page: u32, limit: u32) -> Result<Value> {
        self.api.get_json(
            "prompts",
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
    }

    pub fn get_prompt(&self, id: &str) -> Result<Value> {
        self.api.get_json(&format!("prompts/{id}"), &[])
    }

    /// Materializes the image bytes, downloading when the backend returned a
    /// URL.
    pub fn fetch_image(&self, image: &ImagePayload) -> Result<Vec<u8>> {
        match image {
            ImagePayload::Url(url) => {
                let (bytes, _) = self.api.download(url)?;
                Ok(bytes)
            }
            ImagePayload::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Guard evaluated before any network traffic: empty or whitespace-only
/// prompts never dispatch.
pub fn non_empty_prompt(prompt: &str) -> Option<&str> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub fn generation_payload(prompt: &str, model: &str, params: GenerationParams) -> Value {
    serde_json::json!({
        "prompt": prompt,
        "model": model,
        "parameters": {
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        },
    })
}

pub fn flatten_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<String>>()
        .join("\n")
}

/// The text endpoint wraps its output as `{generation: {content}}`.
pub fn parse_text_generation(response: &Value) -> Result<String> {
    response
        .get("generation")
        .and_then(|generation| generation.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("generation response missing content"))
}

/// The image endpoint must hand back an `imageUrl` (or a `b64_json` payload)
/// even on HTTP 200; anything else is a failure.
pub fn parse_image_generation(response: &Value) -> Result<ImagePayload> {
    if let Some(url) = response
        .get("imageUrl")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(ImagePayload::Url(url.to_string()));
    }
    if let Some(encoded) = response.get("b64_json").and_then(Value::as_str) {
        let bytes = BASE64
            .decode(encoded.trim())
            .context("image response carried invalid base64 payload")?;
        return Ok(ImagePayload::Bytes(bytes));
    }
    bail!("image generation response missing imageUrl");
}

#[cfg(test)]
mod tests {
    use mars_contracts::params::{GenerationParams, ResponseLength, TemperatureMode};
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_prompt_is_rejected_before_dispatch() {
        assert_eq!(non_empty_prompt(""), None);
        assert_eq!(non_empty_prompt("   \n\t"), None);
        assert_eq!(non_empty_prompt("  write a loop  "), Some("write a loop"));
    }

    #[test]
    fn payload_carries_resolved_parameters() {
        let params = GenerationParams::resolve(TemperatureMode::Balanced, ResponseLength::Medium);
        let payload = generation_payload("write a loop", "gemini-2.0-flash", params);
        assert_eq!(payload["prompt"], json!("write a loop"));
        assert_eq!(payload["model"], json!("gemini-2.0-flash"));
        assert_eq!(payload["parameters"]["temperature"], json!(0.7));
        assert_eq!(payload["parameters"]["max_tokens"], json!(1000));
    }

    #[test]
    fn text_response_parses_generation_content() {
        let response = json!({"generation": {"content": "for i in range(10): ..."}});
        assert_eq!(
            parse_text_generation(&response).unwrap(),
            "for i in range(10): ..."
        );
        assert!(parse_text_generation(&json!({"generation": {}})).is_err());
        assert!(parse_text_generation(&json!({})).is_err());
    }

    #[test]
    fn image_response_requires_image_url_even_on_200() {
        let ok = parse_image_generation(&json!({"imageUrl": "https://cdn.example/fox.png"}));
        assert_eq!(
            ok.unwrap(),
            ImagePayload::Url("https://cdn.example/fox.png".to_string())
        );

        let missing = parse_image_generation(&json!({"status": "ok"}));
        assert!(missing.is_err());
        let blank = parse_image_generation(&json!({"imageUrl": "  "}));
        assert!(blank.is_err());
    }

    #[test]
    fn image_response_accepts_base64_payload() {
        let encoded = BASE64.encode(b"png-bytes");
        let parsed = parse_image_generation(&json!({ "b64_json": encoded })).unwrap();
        assert_eq!(parsed, ImagePayload::Bytes(b"png-bytes".to_vec()));

        let invalid = parse_image_generation(&json!({"b64_json": "@@not-base64@@"}));
        assert!(invalid.is_err());
    }

    #[test]
    fn transcript_flattens_role_prefixed_lines() {
        let messages = vec![
            ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: "hello".to_string(),
            },
        ];
        assert_eq!(flatten_transcript(&messages), "user: hi\nassistant: hello");
    }

    #[test]
    fn outcome_output_text_is_confirmation_for_images() {
        let outcome = GenerationOutcome::Image {
            model: "stable-diffusion-xl-1024-v1-0".to_string(),
            image: ImagePayload::Url("https://cdn.example/fox.png".to_string()),
        };
        assert_eq!(outcome.output_text(), IMAGE_CONFIRMATION);
        assert_eq!(outcome.image_url(), Some("https://cdn.example/fox.png"));

        let text = GenerationOutcome::Text {
            model: "gemini-2.0-flash".to_string(),
            content: "hello".to_string(),
        };
        assert_eq!(text.output_text(), "hello");
        assert_eq!(text.image_url(), None);
    }
}
