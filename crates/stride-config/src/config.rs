//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the movement reconciliation core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Walking engine tuning.
    pub movement: MovementConfig,
    /// Client-side prediction settings.
    pub prediction: PredictionConfig,
    /// Network / server settings.
    pub network: NetworkConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Walking engine tuning.
///
/// The walkable slope angle and correction tolerance are deliberately
/// configuration rather than constants; both sides of the connection must
/// agree on them for replay to converge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// Permit the capsule to pass through blocking geometry. Off by default;
    /// intended for debug flythrough only.
    pub allow_walking_through_walls: bool,
    /// Scale applied to the slide response against non-walkable surfaces.
    /// Clamped to [0.01, 1.0]; higher values bias toward sliding over
    /// stepping.
    pub wall_repulsion_multiplier: f32,
    /// Steepest floor angle (degrees from horizontal) still classified
    /// walkable.
    pub walkable_floor_angle_deg: f32,
    /// Maximum ledge height the capsule can step up onto, in world units.
    pub max_step_height: f32,
    /// Maximum ground speed in units per second.
    pub max_walk_speed: f32,
    /// Downward gravity acceleration (units/s², negative = down).
    pub gravity_y: f32,
}

/// Client-side prediction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    /// Maximum number of unacknowledged saved moves kept for replay
    /// (~2 s at 60 Hz).
    pub max_buffer_size: usize,
    /// Oldest a buffered move may grow (seconds) before the client gives up
    /// on replay and forces a resync to the last known server state.
    pub max_move_age_secs: f32,
}

/// Network / server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Simulation tick rate shared by client and server (Hz).
    pub tick_rate: u32,
    /// Positional error (world units) beyond which the server emits a
    /// correction and the client snaps-and-replays.
    pub correction_tolerance: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            allow_walking_through_walls: false,
            wall_repulsion_multiplier: 0.2,
            walkable_floor_angle_deg: 45.0,
            max_step_height: 0.5,
            max_walk_speed: 5.0,
            gravity_y: -9.81,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 128,
            max_move_age_secs: 2.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            correction_tolerance: 0.1,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Clamp ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let mut config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.clamp();
            tracing::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::default();
        let contents =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(&config_path, contents).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Clamps out-of-range values to their documented bounds.
    pub fn clamp(&mut self) {
        self.movement.wall_repulsion_multiplier =
            self.movement.wall_repulsion_multiplier.clamp(0.01, 1.0);
        self.movement.walkable_floor_angle_deg =
            self.movement.walkable_floor_angle_deg.clamp(0.0, 89.0);
        if self.network.tick_rate == 0 {
            self.network.tick_rate = NetworkConfig::default().tick_rate;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
