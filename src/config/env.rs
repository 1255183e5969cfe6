//! Environment variable loading.

use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_INSTRUCTIONS, DEFAULT_INTRODUCTION,
    DEFAULT_PORT, ServerConfig, TlsConfig,
};
use crate::core::assistant::{AudioFormat, OPENAI_REALTIME_URL, RealtimeModel, RealtimeVoice};

/// Read a variable, treating unset and blank values alike.
pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| format!("Invalid {name} value '{value}': {e}").into())
        })
        .transpose()
}

fn parse_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    env_var(name)
        .map(|value| match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(format!("Invalid {name} value '{value}': expected true or false").into()),
        })
        .transpose()
}

/// TLS settings from `TLS_ENABLED`, `TLS_CERT_PATH` and `TLS_KEY_PATH`.
pub(super) fn tls_from_env() -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    if !parse_bool("TLS_ENABLED")?.unwrap_or(false) {
        return Ok(None);
    }
    let cert_path = env_var("TLS_CERT_PATH")
        .ok_or("TLS_ENABLED is set but TLS_CERT_PATH is missing")?;
    let key_path =
        env_var("TLS_KEY_PATH").ok_or("TLS_ENABLED is set but TLS_KEY_PATH is missing")?;

    Ok(Some(TlsConfig {
        cert_path: PathBuf::from(cert_path),
        key_path: PathBuf::from(key_path),
    }))
}

/// Build a configuration from the environment, with defaults for anything
/// unset.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT")?.unwrap_or(DEFAULT_PORT),
        public_host: env_var("HOSTNAME").unwrap_or_default(),
        tls: tls_from_env()?,
        openai_api_key: env_var("OPENAI_API_KEY"),
        openai_realtime_url: env_var("OPENAI_REALTIME_URL")
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        openai_model: env_var("OPENAI_MODEL")
            .map(|value| RealtimeModel::from_str_or_default(&value))
            .unwrap_or_default(),
        openai_voice: env_var("OPENAI_VOICE")
            .map(|value| RealtimeVoice::from_str_or_default(&value))
            .unwrap_or_default(),
        audio_format: env_var("AUDIO_FORMAT")
            .map(|value| AudioFormat::from_str_or_default(&value))
            .unwrap_or_default(),
        connect_timeout_secs: parse_env("CONNECT_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        assistant_instructions: env_var("ASSISTANT_INSTRUCTIONS")
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        assistant_introduction: env_var("ASSISTANT_INTRODUCTION")
            .unwrap_or_else(|| DEFAULT_INTRODUCTION.to_string()),
    })
}
