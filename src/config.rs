use anyhow::Result;
use serde::Deserialize;

use crate::live::LiveConfig;
use crate::session::{SessionConfig, EXAMINER_INSTRUCTION};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveSettings,
    pub audio: AudioSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LiveSettings {
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub block_frames: usize,
}

impl Config {
    /// Load from a TOML file plus `VIVA__`-prefixed environment
    /// overrides (e.g. `VIVA__SERVICE__HTTP__PORT=8080`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VIVA").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session parameters for this deployment. The API key comes from
    /// the process environment, never from the config file.
    pub fn session_config(&self, api_key: String) -> SessionConfig {
        SessionConfig {
            live: LiveConfig {
                model: self.live.model.clone(),
                voice: self.live.voice.clone(),
                system_instruction: EXAMINER_INSTRUCTION.to_string(),
                api_key,
            },
            input_sample_rate: self.audio.input_sample_rate,
            output_sample_rate: self.audio.output_sample_rate,
            block_frames: self.audio.block_frames,
            ..SessionConfig::default()
        }
    }
}
