//! Configuration validation logic.

use super::TlsConfig;

/// The Realtime API cannot be reached without a key.
pub(super) fn validate_openai_api_key(
    api_key: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err("OPENAI_API_KEY must be set (or openai.api_key in the config file)".into()),
    }
}

/// Twilio is handed `wss://{public_host}/...`, so the value must be a bare
/// host with an optional port.
pub(super) fn validate_public_host(public_host: &str) -> Result<(), Box<dyn std::error::Error>> {
    if public_host.is_empty() {
        return Err(
            "HOSTNAME must be set to the public host Twilio can reach (or server.public_host)"
                .into(),
        );
    }
    if public_host.contains("://") || public_host.contains('/') {
        return Err(format!(
            "Public host '{public_host}' must not contain a scheme or path"
        )
        .into());
    }
    Ok(())
}

pub(super) fn validate_realtime_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        Ok(())
    } else {
        Err(format!("OpenAI realtime URL '{url}' must use ws:// or wss://").into())
    }
}

pub(super) fn validate_connect_timeout(secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    if secs == 0 {
        return Err("CONNECT_TIMEOUT_SECS must be greater than 0".into());
    }
    Ok(())
}

/// Certificate and key files must exist when TLS is enabled.
pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
    }
    Ok(())
}
