use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::Form as MultipartForm;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;

/// Thin blocking HTTP client for the backend. Attaches the bearer token from
/// the injected credential provider and applies the global unauthorized
/// rule: any 401 clears the stored credential before the error surfaces,
/// overriding whatever the call site would otherwise do.
pub struct ApiClient {
    http: HttpClient,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.credentials
    }

    pub fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let endpoint = self.config.endpoint(path);
        let request = self.authorize(self.http.get(&endpoint)).query(query);
        let response = request
            .send()
            .with_context(|| format!("GET {endpoint} failed"))?;
        self.json_body(path, response)
    }

    pub fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.config.endpoint(path);
        self.post_json_to(&endpoint, path, payload)
    }

    /// The image backend shares the request shape but lives under its own
    /// configured root.
    pub fn post_image_json(&self, path: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.config.image_endpoint(path);
        self.post_json_to(&endpoint, path, payload)
    }

    pub fn post_multipart(&self, path: &str, form: MultipartForm) -> Result<Value> {
        let endpoint = self.config.endpoint(path);
        let request = self.authorize(self.http.post(&endpoint)).multipart(form);
        let response = request
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?;
        self.json_body(path, response)
    }

    /// POST returning a raw body (the CSV export endpoint).
    pub fn post_for_bytes(&self, path: &str, payload: &Value) -> Result<Vec<u8>> {
        let endpoint = self.config.endpoint(path);
        let request = self.authorize(self.http.post(&endpoint)).json(payload);
        let response = request
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?;
        let response = self.checked(path, response)?;
        Ok(response
            .bytes()
            .with_context(|| format!("{path} response body read failed"))?
            .to_vec())
    }

    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let endpoint = self.config.endpoint(path);
        let request = self.authorize(self.http.get(&endpoint));
        let response = request
            .send()
            .with_context(|| format!("GET {endpoint} failed"))?;
        let response = self.checked(path, response)?;
        Ok(response
            .bytes()
            .with_context(|| format!("{path} response body read failed"))?
            .to_vec())
    }

    /// Fetch an absolute URL (generated image artifacts live on a CDN, not
    /// under the API root). No bearer token is attached.
    pub fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("failed downloading {url}"))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            bail!("download failed ({code}): {}", truncate_text(&body, 512));
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .context("failed reading downloaded bytes")?
            .to_vec();
        Ok((bytes, mime_type))
    }

    fn post_json_to(&self, endpoint: &str, label: &str, payload: &Value) -> Result<Value> {
        let request = self.authorize(self.http.post(endpoint)).json(payload);
        let response = request
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?;
        self.json_body(label, response)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn checked(&self, label: &str, response: HttpResponse) -> Result<HttpResponse> {
        let status = response.status();
        if status.as_u16() == 401 {
            let _ = self.credentials.clear();
            bail!("{label} request unauthorized (401); stored credential cleared");
        }
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            bail!(
                "{label} request failed ({code}): {}",
                server_error_message(&body)
            );
        }
        Ok(response)
    }

    fn json_body(&self, label: &str, response: HttpResponse) -> Result<Value> {
        let response = self.checked(label, response)?;
        let body = response
            .text()
            .with_context(|| format!("{label} response body read failed"))?;
        let parsed: Value = serde_json::from_str(&body)
            .with_context(|| format!("{label} returned invalid JSON payload"))?;
        Ok(parsed)
    }
}

/// Prefer the backend's own `message`/`error` field; fall back to the
/// truncated raw body.
pub(crate) fn server_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = parsed
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "request failed".to_string();
    }
    truncate_text(trimmed, 512)
}

pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
