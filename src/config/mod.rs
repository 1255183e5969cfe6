//! Configuration module for the voice bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::core::assistant::{
    AudioFormat, OpenAIRealtimeSettings, RealtimeModel, RealtimeVoice, SessionOptions,
};
use crate::core::bridge::BridgeSettings;

mod env;
mod merge;
mod validation;
mod yaml;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_INSTRUCTIONS: &str = "You are a friendly voice assistant answering a phone call. \
     Keep your answers short and conversational.";
pub const DEFAULT_INTRODUCTION: &str = "Hello! How can I help you today?";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge, including:
/// - Server settings (host, port, public hostname, TLS)
/// - OpenAI Realtime credentials and session settings
/// - The assistant's instructions and spoken introduction
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Public hostname Twilio uses to reach the media stream endpoint
    /// (`HOSTNAME`), without scheme.
    pub public_host: String,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // OpenAI Realtime settings
    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    pub openai_realtime_url: String,
    pub openai_model: RealtimeModel,
    pub openai_voice: RealtimeVoice,
    /// Codec used on both legs. Twilio streams G.711 u-law.
    pub audio_format: AudioFormat,
    pub connect_timeout_secs: u64,

    // Assistant behavior
    pub assistant_instructions: String,
    /// Spoken verbatim when the caller's media stream starts.
    pub assistant_introduction: String,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
/// This ensures sensitive data is cleared from memory immediately after use.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Unset variables fall back to defaults. The `.env` file is loaded in
    /// `main.rs` before this is called.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_openai_api_key(&self.openai_api_key)?;
        validation::validate_public_host(&self.public_host)?;
        validation::validate_realtime_url(&self.openai_realtime_url)?;
        validation::validate_connect_timeout(self.connect_timeout_secs)?;
        validation::validate_tls(&self.tls)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// URL Twilio is told to open for the media stream of `call_sid`.
    pub fn media_stream_url(&self, call_sid: &str) -> String {
        format!("wss://{}/media-stream/{}", self.public_host, call_sid)
    }

    /// Connection settings for the Realtime API.
    pub fn realtime_settings(&self) -> OpenAIRealtimeSettings {
        OpenAIRealtimeSettings {
            api_key: Zeroizing::new(self.openai_api_key.clone().unwrap_or_default()),
            url: self.openai_realtime_url.clone(),
            model: self.openai_model,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// Per-call bridge settings.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            introduction: self.assistant_introduction.clone(),
            session: SessionOptions {
                instructions: self.assistant_instructions.clone(),
                voice: self.openai_voice,
                audio_format: self.audio_format,
                ..SessionOptions::default()
            },
        }
    }
}
