use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

use crate::detect::ModelParams;
use crate::frame_loop::DetectFailurePolicy;
use crate::ingest::VideoSettings;
use crate::message::{validate_address, OBJECT_ADDRESS};

const DEFAULT_ENSEMBLE: &str = "arco";
const DEFAULT_VIDEO_URL: &str = "stub://camera";
const DEFAULT_VIDEO_WIDTH: u32 = 640;
const DEFAULT_VIDEO_HEIGHT: u32 = 480;
const DEFAULT_VIDEO_FPS: u32 = 30;
const DEFAULT_REFRESH_HZ: u32 = 60;
const DEFAULT_MQTT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_MQTT_CLIENT_ID: &str = "hto2";

#[derive(Debug, Deserialize, Default)]
struct BridgeConfigFile {
    ensemble: Option<String>,
    address: Option<String>,
    refresh_hz: Option<u32>,
    on_detect_error: Option<DetectFailurePolicy>,
    video: Option<VideoConfigFile>,
    model: Option<ModelParams>,
    messenger: Option<MessengerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MessengerConfigFile {
    kind: Option<MessengerKind>,
    broker: Option<String>,
    client_id: Option<String>,
}

/// Which `Messenger` the binary wires up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessengerKind {
    Log,
    Mqtt,
}

impl std::str::FromStr for MessengerKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(anyhow!("unknown messenger kind {:?} (expected log or mqtt)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessengerSettings {
    pub kind: MessengerKind,
    pub broker: String,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ensemble: String,
    pub address: String,
    pub refresh_hz: u32,
    pub on_detect_error: DetectFailurePolicy,
    pub video: VideoSettings,
    pub model: ModelParams,
    pub messenger: MessengerSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_file(BridgeConfigFile::default())
    }
}

impl BridgeConfig {
    /// Defaults, then the file named by `HTO2_CONFIG` (JSON, or TOML by
    /// extension), then `HTO2_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HTO2_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, but with an explicit config file instead of `HTO2_CONFIG`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BridgeConfigFile) -> Self {
        let video = file.video.unwrap_or_default();
        let messenger = file.messenger.unwrap_or_default();
        Self {
            ensemble: file
                .ensemble
                .unwrap_or_else(|| DEFAULT_ENSEMBLE.to_string()),
            address: file.address.unwrap_or_else(|| OBJECT_ADDRESS.to_string()),
            refresh_hz: file.refresh_hz.unwrap_or(DEFAULT_REFRESH_HZ),
            on_detect_error: file.on_detect_error.unwrap_or_default(),
            video: VideoSettings {
                url: video.url.unwrap_or_else(|| DEFAULT_VIDEO_URL.to_string()),
                width: video.width.unwrap_or(DEFAULT_VIDEO_WIDTH),
                height: video.height.unwrap_or(DEFAULT_VIDEO_HEIGHT),
                target_fps: video.target_fps.unwrap_or(DEFAULT_VIDEO_FPS),
            },
            model: file.model.unwrap_or_default(),
            messenger: MessengerSettings {
                kind: messenger.kind.unwrap_or(MessengerKind::Log),
                broker: messenger
                    .broker
                    .unwrap_or_else(|| DEFAULT_MQTT_BROKER.to_string()),
                client_id: messenger
                    .client_id
                    .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(ensemble) = non_empty_env("HTO2_ENSEMBLE") {
            self.ensemble = ensemble;
        }
        if let Some(address) = non_empty_env("HTO2_ADDRESS") {
            self.address = address;
        }
        if let Some(url) = non_empty_env("HTO2_VIDEO_URL") {
            self.video.url = url;
        }
        if let Some(broker) = non_empty_env("HTO2_MQTT_BROKER") {
            self.messenger.broker = broker;
            self.messenger.kind = MessengerKind::Mqtt;
        }
        if let Some(kind) = non_empty_env("HTO2_MESSENGER") {
            self.messenger.kind = kind.parse()?;
        }
        if let Some(hz) = non_empty_env("HTO2_REFRESH_HZ") {
            self.refresh_hz = hz
                .parse()
                .map_err(|_| anyhow!("HTO2_REFRESH_HZ must be an integer number of frames per second"))?;
        }
        if let Some(policy) = non_empty_env("HTO2_ON_DETECT_ERROR") {
            self.on_detect_error = policy.parse()?;
        }
        if let Some(threshold) = non_empty_env("HTO2_SCORE_THRESHOLD") {
            self.model.score_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("HTO2_SCORE_THRESHOLD must be a number in [0, 1]"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_ensemble(&self.ensemble)?;
        validate_address(&self.address)?;
        self.model.validate()?;
        if self.refresh_hz == 0 {
            return Err(anyhow!("refresh_hz must be greater than zero"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(anyhow!(
                "video size must be non-zero, got {}x{}",
                self.video.width,
                self.video.height
            ));
        }
        Ok(())
    }
}

/// Ensemble names: 1..64 of `[A-Za-z0-9_.-]`.
pub fn validate_ensemble(ensemble: &str) -> Result<()> {
    static ENSEMBLE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ENSEMBLE_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").expect("ensemble pattern compiles"));
    if !re.is_match(ensemble) {
        return Err(anyhow!(
            "ensemble {:?} must match ^[A-Za-z0-9_.-]{{1,64}}$",
            ensemble
        ));
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<BridgeConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = BridgeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.ensemble, "arco");
        assert_eq!(cfg.address, "/htclient/obj");
        assert_eq!(cfg.messenger.kind, MessengerKind::Log);
        assert_eq!(cfg.on_detect_error, DetectFailurePolicy::Halt);
    }

    #[test]
    fn ensemble_names_are_restricted() {
        assert!(validate_ensemble("arco").is_ok());
        assert!(validate_ensemble("my-ensemble_2.0").is_ok());
        assert!(validate_ensemble("").is_err());
        assert!(validate_ensemble("has space").is_err());
        assert!(validate_ensemble("a/b").is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut cfg = BridgeConfig::default();
        cfg.address = "htclient/obj".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = BridgeConfig::default();
        cfg.refresh_hz = 0;
        assert!(cfg.validate().is_err());
    }
}
