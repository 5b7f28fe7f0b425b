use super::consts;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub struct ClientConfig {
    base_url: String,
    api_key: SecretString,
    connect_timeout: Duration,
    setup_timeout: Duration,
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.config.api_key = api_key;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.config.setup_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    // Falls back to the GEMINI_API_KEY environment variable; empty when unset.
    pub fn new() -> Self {
        Self {
            base_url: consts::BASE_URL.to_string(),
            api_key: std::env::var(consts::GEMINI_API_KEY)
                .unwrap_or_default()
                .into(),
            connect_timeout: consts::CONNECT_TIMEOUT,
            setup_timeout: consts::SETUP_TIMEOUT,
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn setup_timeout(&self) -> Duration {
        self.setup_timeout
    }

    /// Endpoint URL including the API key query parameter.
    pub(crate) fn url(&self) -> String {
        format!("{}?key={}", self.base_url, self.api_key.expose_secret())
    }
}
