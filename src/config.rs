//! Application-level configuration loading: the game catalog and relay limits.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the configuration is looked up.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HUDDLE_SYNC_CONFIG_PATH";
/// Port the relay listens on when neither `PORT` nor `SERVER_PORT` is set.
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    game: GameSettings,
    relay: RelaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Teams, roles and questions every client of a session must agree on.
pub struct GameSettings {
    /// Teams offered at registration, in wheel order.
    pub teams: Vec<String>,
    /// Roles offered at registration.
    pub roles: Vec<String>,
    /// Questions played before the ones submitted by players.
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Limits applied by the relay server.
pub struct RelaySettings {
    /// Frames buffered per subscriber before a slow peer starts skipping.
    pub channel_capacity: usize,
    /// Upper bound on concurrently connected peers.
    pub max_peers: usize,
    /// Frames larger than this are dropped instead of relayed.
    pub max_frame_bytes: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        teams = app_config.game.teams.len(),
                        questions = app_config.game.questions.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing sections keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Teams, roles and questions of the game.
    pub fn game(&self) -> &GameSettings {
        &self.game
    }

    /// Limits of the relay server.
    pub fn relay(&self) -> RelaySettings {
        self.relay
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            teams: to_strings(&["Executive", "Review", "Teaching", "Energizer"]),
            roles: to_strings(&[
                "Manager",
                "Developer",
                "Designer",
                "Analyst",
                "Coordinator",
                "Specialist",
            ]),
            questions: to_strings(&[
                "What is the most important skill for effective teamwork?",
                "How can we improve communication in our organization?",
                "What motivates you most in your work environment?",
                "What is the biggest challenge facing our team right now?",
            ]),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            max_peers: 512,
            max_frame_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    teams: Option<Vec<String>>,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    questions: Option<Vec<String>>,
    #[serde(default)]
    relay: Option<RawRelay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the `relay` section.
struct RawRelay {
    channel_capacity: Option<usize>,
    max_peers: Option<usize>,
    max_frame_bytes: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = GameSettings::default();
        let game = GameSettings {
            teams: non_empty_or(value.teams, defaults.teams),
            roles: non_empty_or(value.roles, defaults.roles),
            questions: value.questions.unwrap_or(defaults.questions),
        };

        let fallback = RelaySettings::default();
        let relay = match value.relay {
            Some(raw) => RelaySettings {
                channel_capacity: raw
                    .channel_capacity
                    .unwrap_or(fallback.channel_capacity)
                    .max(1),
                max_peers: raw.max_peers.unwrap_or(fallback.max_peers),
                max_frame_bytes: raw.max_frame_bytes.unwrap_or(fallback.max_frame_bytes),
            },
            None => fallback,
        };

        Self { game, relay }
    }
}

/// An empty team or role list would make registration impossible.
fn non_empty_or(value: Option<Vec<String>>, fallback: Vec<String>) -> Vec<String> {
    match value {
        Some(list) if !list.is_empty() => list,
        _ => fallback,
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
