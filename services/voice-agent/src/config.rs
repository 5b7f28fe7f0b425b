//! Application Configuration Module
//!
//! Loads settings for the voice agent from environment variables (and a
//! `.env` file when present) into a single struct passed to `main`.

use secrecy::SecretString;
use std::env;
use tracing_subscriber::EnvFilter;
use voice_core::generic_types::DEFAULT_SYSTEM_PROMPT;
use voice_core::AgentFinality;

pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub gemini_api_key: SecretString,
    pub model: String,
    pub voice: Option<String>,
    pub system_prompt: String,
    pub agent_finality: AgentFinality,
    pub log_filter: String,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log filter provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Secret key for the Gemini API. Required.
    // *   `GEMINI_MODEL`: (Optional) Live model id. Defaults to the native-audio preview model.
    // *   `GEMINI_VOICE`: (Optional) Prebuilt voice name.
    // *   `VOICE_AGENT_SYSTEM_PROMPT`: (Optional) System instruction for the assistant.
    // *   `VOICE_AGENT_AGENT_FINALITY`: (Optional) "honor" or "force-non-final". Defaults to "honor".
    // *   `RUST_LOG`: (Optional) Log filter. Defaults to "info".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let gemini_api_key = non_empty("GEMINI_API_KEY")
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let model = non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let voice = non_empty("GEMINI_VOICE");
        let system_prompt = non_empty("VOICE_AGENT_SYSTEM_PROMPT")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let agent_finality = match non_empty("VOICE_AGENT_AGENT_FINALITY") {
            Some(value) => value.parse::<AgentFinality>().map_err(|reason| ConfigError::InvalidValue {
                name: "VOICE_AGENT_AGENT_FINALITY".to_string(),
                reason,
            })?,
            None => AgentFinality::default(),
        };

        let log_filter = non_empty("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        EnvFilter::try_new(&log_filter).map_err(|_| ConfigError::InvalidLogLevel(log_filter.clone()))?;

        Ok(Self {
            gemini_api_key: SecretString::from(gemini_api_key),
            model,
            voice,
            system_prompt,
            agent_finality,
            log_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "abc")])).unwrap();

        assert_eq!(config.gemini_api_key.expose_secret(), "abc");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.voice, None);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.agent_finality, AgentFinality::Honor);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let result = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")]));

        assert!(matches!(result, Err(ConfigError::MissingVar(name)) if name == "GEMINI_API_KEY"));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "abc"),
            ("GEMINI_MODEL", "models/other"),
            ("GEMINI_VOICE", "Kore"),
            ("VOICE_AGENT_SYSTEM_PROMPT", "Answer in French."),
            ("VOICE_AGENT_AGENT_FINALITY", "force-non-final"),
            ("RUST_LOG", "voice_agent=debug,info"),
        ]))
        .unwrap();

        assert_eq!(config.model, "models/other");
        assert_eq!(config.voice.as_deref(), Some("Kore"));
        assert_eq!(config.system_prompt, "Answer in French.");
        assert_eq!(config.agent_finality, AgentFinality::ForceNonFinal);
        assert_eq!(config.log_filter, "voice_agent=debug,info");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "abc"),
            ("VOICE_AGENT_AGENT_FINALITY", "maybe"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "abc"), ("RUST_LOG", "voice_agent=loud")]));
        assert!(matches!(result, Err(ConfigError::InvalidLogLevel(_))));
    }
}
