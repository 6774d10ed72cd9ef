use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://mars-genai-backend.onrender.com/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Explicit client configuration passed to every service, replacing the
/// ambient module-level client the web front-end used.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    /// Root of the image-generation API. Defaults to `api_base`; the image
    /// backend only differs in its response shape.
    pub image_api_base: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = trim_base(api_base.into());
        Self {
            image_api_base: api_base.clone(),
            api_base,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Flag value wins, then `MARS_API_BASE` / `MARS_IMAGE_API_BASE`, then
    /// the default backend.
    pub fn resolve(api_base: Option<&str>) -> Self {
        let base = api_base
            .map(str::to_string)
            .or_else(|| env::var("MARS_API_BASE").ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let mut config = Self::new(base);
        if let Some(image_base) = env::var("MARS_IMAGE_API_BASE")
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            config.image_api_base = trim_base(image_base);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub fn image_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.image_api_base, path.trim_start_matches('/'))
    }
}

fn trim_base(base: String) -> String {
    base.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = ClientConfig::new("https://api.example/v1/");
        assert_eq!(
            config.endpoint("/auth/login"),
            "https://api.example/v1/auth/login"
        );
        assert_eq!(
            config.endpoint("generations"),
            "https://api.example/v1/generations"
        );
    }

    #[test]
    fn image_base_defaults_to_api_base() {
        let config = ClientConfig::new("https://api.example/v1");
        assert_eq!(
            config.image_endpoint("generations"),
            "https://api.example/v1/generations"
        );
    }

    #[test]
    fn explicit_base_wins_over_default() {
        let config = ClientConfig::resolve(Some("https://other.example/api"));
        assert_eq!(config.api_base, "https://other.example/api");
    }
}
