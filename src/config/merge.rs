//! Merging YAML overrides on top of the environment configuration.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};
use crate::core::assistant::{AudioFormat, RealtimeModel, RealtimeVoice};

/// Load the environment configuration and apply any YAML values on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(public_host) = server.public_host {
            config.public_host = public_host;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let cert_path = tls
                        .cert_path
                        .ok_or("server.tls.enabled is true but cert_path is missing")?;
                    let key_path = tls
                        .key_path
                        .ok_or("server.tls.enabled is true but key_path is missing")?;
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert_path),
                        key_path: PathBuf::from(key_path),
                    });
                }
                None => {}
            }
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(api_key) = openai.api_key {
            config.openai_api_key = Some(api_key);
        }
        if let Some(url) = openai.realtime_url {
            config.openai_realtime_url = url;
        }
        if let Some(model) = openai.model {
            config.openai_model = RealtimeModel::from_str_or_default(&model);
        }
        if let Some(voice) = openai.voice {
            config.openai_voice = RealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(format) = openai.audio_format {
            config.audio_format = AudioFormat::from_str_or_default(&format);
        }
        if let Some(timeout) = openai.connect_timeout_secs {
            config.connect_timeout_secs = timeout;
        }
    }

    if let Some(assistant) = yaml.assistant {
        if let Some(instructions) = assistant.instructions {
            config.assistant_instructions = instructions;
        }
        if let Some(introduction) = assistant.introduction {
            config.assistant_introduction = introduction;
        }
    }

    Ok(config)
}
