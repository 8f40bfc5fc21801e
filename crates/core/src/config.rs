use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artnet::network_config::NetworkConfig;
use crate::audio::audio_control::DmxAudioChannels;
use crate::console_state::FadeDefaults;
use crate::levels::{CHANNELS, UNIVERSE_SIZE};
use crate::modules::audio_module::DEFAULT_PLAYER_COMMAND;
use crate::patch::ChannelPatch;

/// How PLAY/STOP/VOLUME steps reach the music.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioMode {
    /// External player process in slave mode.
    Mplayer,
    /// MP3 player driven over DMX channels.
    Dmx,
}

/// Console settings, persisted in `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Show settings
    pub fade_in_ms: u64,
    pub fade_out_ms: u64,
    pub show_path: PathBuf,
    pub scenes_path: PathBuf,
    pub fader_labels: Vec<String>,

    // Audio settings
    pub audio_mode: AudioMode,
    pub mplayer_command: String,
    pub audio_song_select_channel: usize,
    pub audio_play_stop_channel: usize,
    pub audio_volume_channel: usize,

    // Output settings (DMX/Art-Net)
    pub transmit_period_ms: u64,
    pub patch: [u16; CHANNELS],
    pub dmx_broadcast: bool,
    pub dmx_source_ip: String,
    pub dmx_dest_ip: Option<String>,
    pub dmx_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fade_in_ms: 1200,
            fade_out_ms: 3000,
            show_path: PathBuf::from("show.txt"),
            scenes_path: PathBuf::from("scenes.txt"),
            fader_labels: (1..=CHANNELS).map(|c| format!("CH-{:02}", c)).collect(),

            audio_mode: AudioMode::Mplayer,
            mplayer_command: DEFAULT_PLAYER_COMMAND.to_string(),
            audio_song_select_channel: 50,
            audio_play_stop_channel: 51,
            audio_volume_channel: 52,

            transmit_period_ms: 28,
            patch: *ChannelPatch::identity().addresses(),
            dmx_broadcast: true,
            dmx_source_ip: "0.0.0.0".to_string(),
            dmx_dest_ip: None,
            dmx_port: 6454,
        }
    }
}

impl Settings {
    pub fn fade_defaults(&self) -> FadeDefaults {
        FadeDefaults::new(
            Duration::from_millis(self.fade_in_ms),
            Duration::from_millis(self.fade_out_ms),
        )
    }

    pub fn transmit_period(&self) -> Duration {
        Duration::from_millis(self.transmit_period_ms)
    }

    pub fn patch(&self) -> ChannelPatch {
        ChannelPatch::new(self.patch)
    }

    pub fn audio_channels(&self) -> DmxAudioChannels {
        DmxAudioChannels {
            song_select: self.audio_song_select_channel,
            play_stop: self.audio_play_stop_channel,
            volume: self.audio_volume_channel,
        }
    }

    /// Art-Net destination. Unparseable addresses fall back to broadcast from any interface.
    pub fn network_config(&self) -> NetworkConfig {
        let source_ip = self.dmx_source_ip.parse::<IpAddr>().unwrap_or_else(|_| {
            log::warn!("Invalid dmx_source_ip '{}', using 0.0.0.0", self.dmx_source_ip);
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
        let dest_ip = self.dmx_dest_ip.as_deref().and_then(|ip| match ip.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                log::warn!("Invalid dmx_dest_ip '{}', broadcasting instead", ip);
                None
            }
        });
        NetworkConfig::new(source_ip, dest_ip, self.dmx_port, self.dmx_broadcast)
    }

    /// Label of a fader, 1-based. Missing labels fall back to the channel number.
    pub fn fader_label(&self, channel: usize) -> String {
        channel
            .checked_sub(1)
            .and_then(|i| self.fader_labels.get(i))
            .cloned()
            .unwrap_or_else(|| format!("CH-{:02}", channel))
    }
}

/// Configuration manager for console settings.
///
/// Settings are stored in `config.json` in the working directory unless another path is given.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub show: ShowConfigSchema,
    pub audio: AudioConfigSchema,
    pub output: OutputConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowConfigSchema {
    pub fade_in_ms: ConfigOption<u64>,
    pub fade_out_ms: ConfigOption<u64>,
    pub show_path: ConfigOption<String>,
    pub scenes_path: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfigSchema {
    pub audio_mode: ConfigOption<AudioMode>,
    pub mplayer_command: ConfigOption<String>,
    pub audio_song_select_channel: ConfigOption<usize>,
    pub audio_play_stop_channel: ConfigOption<usize>,
    pub audio_volume_channel: ConfigOption<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub transmit_period_ms: ConfigOption<u64>,
    pub patch_address: ConfigOption<u16>,
    pub dmx_broadcast: ConfigOption<bool>,
    pub dmx_source_ip: ConfigOption<String>,
    pub dmx_dest_ip: ConfigOption<String>,
    pub dmx_port: ConfigOption<u16>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T> ConfigOption<T> {
    fn new(default: T, description: &str, requires_restart: bool) -> Self {
        Self {
            default,
            valid_range: None,
            valid_choices: None,
            description: description.to_string(),
            requires_restart,
        }
    }

    fn with_range(mut self, min: T, max: T) -> Self {
        self.valid_range = Some((min, max));
        self
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    errors: &mut Vec<String>,
    name: &str,
    value: T,
    option: &ConfigOption<T>,
) {
    if let Some((min, max)) = &option.valid_range {
        if value < *min || value > *max {
            errors.push(format!("{} must be between {} and {}", name, min, max));
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// If no path is provided, defaults to `config.json` in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, writing defaults first if there is none.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)?;
        let config_file: ConfigFile = serde_json::from_str(&content)?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Like [`load`](Self::load), but any failure is logged and the defaults are used.
    pub fn load_or_default(&mut self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Using default settings, {} not usable: {}",
                    self.config_path.display(),
                    e
                );
                self.settings = Settings::default();
                self.settings.clone()
            }
        }
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(ConfigError::Write)?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: now.clone(),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file).map_err(ConfigError::Serialize)?;
        fs::write(&self.config_path, content).map_err(ConfigError::Write)?;

        Ok(())
    }

    /// Update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        let max_address = UNIVERSE_SIZE as u16;

        ConfigSchema {
            show: ShowConfigSchema {
                fade_in_ms: ConfigOption::new(
                    defaults.fade_in_ms,
                    "Fade-in time for SCENE UP steps without their own time, in milliseconds",
                    false,
                )
                .with_range(0, 600_000),
                fade_out_ms: ConfigOption::new(
                    defaults.fade_out_ms,
                    "Fade-out time for SCENE DOWN steps without their own time, in milliseconds",
                    false,
                )
                .with_range(0, 600_000),
                show_path: ConfigOption::new(
                    defaults.show_path.display().to_string(),
                    "Show script to load at startup",
                    false,
                ),
                scenes_path: ConfigOption::new(
                    defaults.scenes_path.display().to_string(),
                    "File the 16 scenes are stored in",
                    true,
                ),
            },
            audio: AudioConfigSchema {
                audio_mode: ConfigOption {
                    default: defaults.audio_mode,
                    valid_range: None,
                    valid_choices: Some(vec![AudioMode::Mplayer, AudioMode::Dmx]),
                    description: "Audio player used by PLAY, STOP and VOLUME steps".to_string(),
                    requires_restart: true,
                },
                mplayer_command: ConfigOption::new(
                    defaults.mplayer_command.clone(),
                    "Command line of the external audio player",
                    true,
                ),
                audio_song_select_channel: ConfigOption::new(
                    defaults.audio_song_select_channel,
                    "DMX address selecting the song on a DMX audio player",
                    true,
                )
                .with_range(1, UNIVERSE_SIZE),
                audio_play_stop_channel: ConfigOption::new(
                    defaults.audio_play_stop_channel,
                    "DMX address starting and stopping a DMX audio player",
                    true,
                )
                .with_range(1, UNIVERSE_SIZE),
                audio_volume_channel: ConfigOption::new(
                    defaults.audio_volume_channel,
                    "DMX address setting the volume of a DMX audio player",
                    true,
                )
                .with_range(1, UNIVERSE_SIZE),
            },
            output: OutputConfigSchema {
                transmit_period_ms: ConfigOption::new(
                    defaults.transmit_period_ms,
                    "Time between two Art-Net frames in milliseconds",
                    true,
                )
                .with_range(10, 1000),
                patch_address: ConfigOption::new(1, "Physical DMX address of each fader", true)
                    .with_range(1, max_address),
                dmx_broadcast: ConfigOption::new(
                    defaults.dmx_broadcast,
                    "Use broadcast mode for Art-Net (vs unicast)",
                    true,
                ),
                dmx_source_ip: ConfigOption::new(
                    defaults.dmx_source_ip.clone(),
                    "Source IP address for Art-Net output",
                    true,
                ),
                dmx_dest_ip: ConfigOption::new(
                    String::new(),
                    "Destination IP address for Art-Net unicast",
                    true,
                ),
                dmx_port: ConfigOption::new(defaults.dmx_port, "UDP port for Art-Net output", true)
                    .with_range(1024, 65535),
            },
        }
    }

    /// Validate settings against schema, reporting every violation
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        check_range(&mut errors, "fade_in_ms", settings.fade_in_ms, &schema.show.fade_in_ms);
        check_range(&mut errors, "fade_out_ms", settings.fade_out_ms, &schema.show.fade_out_ms);

        if settings.fader_labels.len() != CHANNELS {
            errors.push(format!("fader_labels must have {} entries", CHANNELS));
        }

        if settings.audio_mode == AudioMode::Mplayer && settings.mplayer_command.trim().is_empty() {
            errors.push("mplayer_command must not be empty".to_string());
        }
        check_range(
            &mut errors,
            "audio_song_select_channel",
            settings.audio_song_select_channel,
            &schema.audio.audio_song_select_channel,
        );
        check_range(
            &mut errors,
            "audio_play_stop_channel",
            settings.audio_play_stop_channel,
            &schema.audio.audio_play_stop_channel,
        );
        check_range(
            &mut errors,
            "audio_volume_channel",
            settings.audio_volume_channel,
            &schema.audio.audio_volume_channel,
        );

        check_range(
            &mut errors,
            "transmit_period_ms",
            settings.transmit_period_ms,
            &schema.output.transmit_period_ms,
        );
        for (i, address) in settings.patch.iter().enumerate() {
            check_range(
                &mut errors,
                &format!("patch[{}]", i + 1),
                *address,
                &schema.output.patch_address,
            );
        }
        if settings.dmx_source_ip.parse::<IpAddr>().is_err() {
            errors.push(format!("dmx_source_ip '{}' is not an IP address", settings.dmx_source_ip));
        }
        if let Some(dest) = &settings.dmx_dest_ip {
            if dest.parse::<IpAddr>().is_err() {
                errors.push(format!("dmx_dest_ip '{}' is not an IP address", dest));
            }
        }
        check_range(&mut errors, "dmx_port", settings.dmx_port, &schema.output.dmx_port);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to write config file: {0}")]
    Write(std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),

    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::artnet::artnet::ArtNetMode;

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.load().unwrap(), Settings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = Settings::default();
        settings.fade_in_ms = 500;
        settings.audio_mode = AudioMode::Dmx;
        settings.patch[0] = 100;
        settings.dmx_dest_ip = Some("10.0.0.7".to_string());

        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings, settings);
        assert_eq!(loaded_settings.patch().address(1), Some(100));
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"version":"0.0.1","settings":{"fade_out_ms":4500},"created_at":"","modified_at":""}"#,
        )
        .unwrap();

        let settings = ConfigManager::new(Some(config_path)).load().unwrap();
        assert_eq!(settings.fade_out_ms, 4500);
        assert_eq!(settings.fade_in_ms, 1200);
        assert_eq!(settings.fader_label(16), "CH-16");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        assert!(matches!(manager.load(), Err(ConfigError::Parse(_))));
        assert_eq!(manager.load_or_default(), Settings::default());
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.transmit_period_ms = 5;
        settings.patch[3] = 513;
        settings.dmx_port = 80;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.starts_with("patch[4]")));

        let mut settings = Settings::default();
        settings.fader_labels.pop();
        settings.dmx_source_ip = "lighting-desk".to_string();
        assert_eq!(ConfigManager::validate_settings(&settings).unwrap_err().len(), 2);
    }

    #[test]
    fn test_network_config_from_settings() {
        let mut settings = Settings::default();
        assert_eq!(settings.network_config().mode, ArtNetMode::Broadcast);

        settings.dmx_broadcast = false;
        settings.dmx_source_ip = "192.168.1.10".to_string();
        settings.dmx_dest_ip = Some("192.168.1.20".to_string());
        let config = settings.network_config();
        assert_eq!(config.get_mode_string(), "unicast");
        assert_eq!(config.port, 6454);
    }

    #[test]
    fn test_schema_completeness() {
        let schema = ConfigManager::schema();

        assert_eq!(schema.show.fade_in_ms.default, 1200);
        assert_eq!(schema.show.fade_out_ms.default, 3000);
        assert!(!schema.audio.mplayer_command.description.is_empty());
        assert_eq!(schema.output.transmit_period_ms.valid_range, Some((10, 1000)));
        assert!(schema.output.dmx_port.valid_range.is_some());
    }
}
