use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::CoreError;

/// Minimum media volume.
pub const VOLUME_MIN: i32 = 0;
/// Maximum media volume.
pub const VOLUME_MAX: i32 = 100;
/// Volume applied to a new player instance.
pub const VOLUME_DEFAULT: i32 = 50;
/// Seconds a driver may take to report a loaded source.
pub const LOADING_TIMEOUT_SECS: u64 = 5;

/// Preferred driver per category. `None` selects the registered default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub decoder: Option<String>,
    pub pcm: Option<String>,
    pub player: Option<String>,
    pub recorder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Initial volume for new player instances and pcm channels.
    pub default_volume: i32,
    pub loading_timeout_secs: u64,
    /// Upper bound on concurrently allocated player instances.
    pub max_players: usize,
    /// Depth of the bounded driver-signal channel per engine.
    pub signal_queue_depth: usize,
    pub drivers: DriverSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_volume: VOLUME_DEFAULT,
            loading_timeout_secs: LOADING_TIMEOUT_SECS,
            max_players: 8,
            signal_queue_depth: 64,
            drivers: DriverSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional TOML file, overridden by
    /// `VOXKIT_*` environment variables. Missing keys fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("VOXKIT").separator("__"));

        let settings = builder
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        let config: ClientConfig = settings
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        if config.default_volume < VOLUME_MIN || config.default_volume > VOLUME_MAX {
            return Err(CoreError::Config(format!(
                "default_volume {} outside [{}, {}]",
                config.default_volume, VOLUME_MIN, VOLUME_MAX
            )));
        }
        if config.signal_queue_depth == 0 {
            return Err(CoreError::Config(
                "signal_queue_depth must be non-zero".into(),
            ));
        }

        tracing::debug!(
            target: "voxkit::config",
            max_players = config.max_players,
            default_volume = config.default_volume,
            "Client configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file() {
        let cfg = ClientConfig::load(None).expect("defaults");
        assert_eq!(cfg.default_volume, VOLUME_DEFAULT);
        assert_eq!(cfg.loading_timeout_secs, LOADING_TIMEOUT_SECS);
        assert!(cfg.drivers.player.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "default_volume = 30\nmax_players = 2\n\n[drivers]\nplayer = \"gst\""
        )
        .unwrap();

        let cfg = ClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.default_volume, 30);
        assert_eq!(cfg.max_players, 2);
        assert_eq!(cfg.drivers.player.as_deref(), Some("gst"));
        // untouched keys keep their defaults
        assert_eq!(cfg.signal_queue_depth, 64);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "default_volume = 500").unwrap();
        assert!(ClientConfig::load(Some(file.path())).is_err());
    }
}
