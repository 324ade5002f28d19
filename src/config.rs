//! Gateway configuration: the two values the hosted service requires.

use std::env;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the hosted service, without a trailing slash.
    /// Env: `EVREBATE_SERVICE_URL`
    pub service_url: String,

    /// Public (anonymous) API key sent with every request.
    /// Env: `EVREBATE_SERVICE_KEY`
    pub api_key: String,
}

impl GatewayConfig {
    pub fn new(service_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let service_url = service_url.into().trim_end_matches('/').to_string();
        Self {
            service_url,
            api_key: api_key.into(),
        }
    }

    /// Load configuration from the environment, honoring a `.env` file.
    ///
    /// Both variables are required; the process cannot reach the backend
    /// without them.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let service_url =
            env::var("EVREBATE_SERVICE_URL").expect("EVREBATE_SERVICE_URL must be set");
        let api_key = env::var("EVREBATE_SERVICE_KEY").expect("EVREBATE_SERVICE_KEY must be set");

        Self::new(service_url, api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let config = GatewayConfig::new("https://project.example.co/", "anon-key");
        assert_eq!(config.service_url, "https://project.example.co");
    }

    #[test]
    fn keeps_clean_url() {
        let config = GatewayConfig::new("https://project.example.co", "anon-key");
        assert_eq!(config.service_url, "https://project.example.co");
        assert_eq!(config.api_key, "anon-key");
    }
}
