use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::ElementTemplate;
use serde::Deserialize;
use thiserror::Error;

pub(crate) const CONFIG_ENV_VAR: &str = "DAYFALL_CONFIG";
const MIN_BOARD_SIDE: u32 = 3;
const MAX_BOARD_SIDE: u32 = 64;
const MAX_DELAY_SECS: f64 = 3600.0;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for one run. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) level_start_delay_secs: f64,
    pub(crate) turn_delay_secs: f64,
    pub(crate) restart_level_delay_secs: f64,
    pub(crate) player_food_points: i32,
    pub(crate) food_per_pickup: i32,
    pub(crate) soda_per_pickup: i32,
    pub(crate) player_move_time_secs: f64,
    pub(crate) enemy_move_time_secs: f64,
    pub(crate) board: BoardConfig,
    pub(crate) seed: Option<u64>,
    pub(crate) ui: UiTemplates,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level_start_delay_secs: 2.0,
            turn_delay_secs: 0.1,
            restart_level_delay_secs: 1.0,
            player_food_points: 100,
            food_per_pickup: 10,
            soda_per_pickup: 20,
            player_move_time_secs: 0.1,
            enemy_move_time_secs: 0.1,
            board: BoardConfig::default(),
            seed: None,
            ui: UiTemplates::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct BoardConfig {
    pub(crate) columns: u32,
    pub(crate) rows: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: 8,
            rows: 8,
        }
    }
}

/// Overlay templates; `null` leaves the element unbound.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct UiTemplates {
    pub(crate) title_card: Option<ElementTemplate>,
    pub(crate) game_over: Option<ElementTemplate>,
}

impl Default for UiTemplates {
    fn default() -> Self {
        Self {
            title_card: Some(ElementTemplate::with_label("TitleCard", "TitleLabel")),
            game_over: Some(ElementTemplate::with_label("GameOver", "GameOverLabel")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TurnTiming {
    pub(crate) level_start_delay: Duration,
    pub(crate) turn_delay: Duration,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self {
            level_start_delay: Duration::from_secs(2),
            turn_delay: Duration::from_millis(100),
        }
    }
}

impl GameConfig {
    /// Explicit path first, then `DAYFALL_CONFIG`, then built-in defaults.
    pub(crate) fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub(crate) fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    pub(crate) fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("level_start_delay_secs", self.level_start_delay_secs),
            ("turn_delay_secs", self.turn_delay_secs),
            ("restart_level_delay_secs", self.restart_level_delay_secs),
            ("player_move_time_secs", self.player_move_time_secs),
            ("enemy_move_time_secs", self.enemy_move_time_secs),
        ] {
            let in_range = Duration::try_from_secs_f64(value).is_ok() && value <= MAX_DELAY_SECS;
            if !in_range {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected between 0 and {MAX_DELAY_SECS} seconds, got {value}"),
                });
            }
        }
        if self.player_food_points <= 0 {
            return Err(ConfigError::Invalid {
                field: "player_food_points",
                reason: format!("must be positive, got {}", self.player_food_points),
            });
        }
        let sides = MIN_BOARD_SIDE..=MAX_BOARD_SIDE;
        if !sides.contains(&self.board.columns) || !sides.contains(&self.board.rows) {
            return Err(ConfigError::Invalid {
                field: "board",
                reason: format!(
                    "sides must be between {MIN_BOARD_SIDE} and {MAX_BOARD_SIDE}, got {}x{}",
                    self.board.columns, self.board.rows
                ),
            });
        }
        Ok(())
    }

    pub(crate) fn turn_timing(&self) -> TurnTiming {
        TurnTiming {
            level_start_delay: seconds(self.level_start_delay_secs),
            turn_delay: seconds(self.turn_delay_secs),
        }
    }

    pub(crate) fn restart_level_delay(&self) -> Duration {
        seconds(self.restart_level_delay_secs)
    }

    pub(crate) fn player_move_time(&self) -> Duration {
        seconds(self.player_move_time_secs)
    }

    pub(crate) fn enemy_move_time(&self) -> Duration {
        seconds(self.enemy_move_time_secs)
    }
}

/// Saturates at the delay cap. NaN and negative values give zero.
fn seconds(value: f64) -> Duration {
    if value.is_nan() {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value.min(MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}
