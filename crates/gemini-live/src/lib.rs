pub mod client;
pub mod types;

pub use client::{connect, ClientConfig, ClientConfigBuilder, GeminiClient, LiveEvent};
