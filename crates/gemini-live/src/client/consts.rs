use std::time::Duration;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

pub const BASE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the channel carrying server events to the caller.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
