//! Application-level configuration loading: countdown length, poll cadences and
//! the tuning knobs of the live views.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HUDDLE_BACK_CONFIG_PATH";
/// Environment variable that overrides the file's `display_secret`.
const DISPLAY_SECRET_ENV: &str = "HUDDLE_BACK_DISPLAY_SECRET";

/// Poll cadences of one viewer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Session row re-read for step mirroring.
    pub step: Duration,
    /// Timer re-read while the countdown step is shown.
    pub timer: Duration,
    /// Mood, boards and keywords.
    pub aggregates: Duration,
    /// Conflict and cheer views; `None` relies on change notifications only.
    pub realtime_fallback: Option<Duration>,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Length of the shared countdown.
    pub timer_duration: Duration,
    /// Cadences of participant live views.
    pub participant: PollIntervals,
    /// Cadences of facilitator live views.
    pub facilitator: PollIntervals,
    /// Number of keywords kept in the cloud.
    pub keyword_limit: usize,
    /// Number of raw keywords listed on a personal recap.
    pub recap_keyword_limit: usize,
    /// Delay between a conflict vote and the results reveal.
    pub reveal_delay: Duration,
    /// How long a board form stays hidden after a submission.
    pub board_cooldown: Duration,
    /// Snapshot interval of the REST change feed.
    pub change_poll_interval: Duration,
    /// Advisory client flags untouched for this long are forgotten.
    pub client_idle_ttl: Duration,
    /// How often idle client flags are swept.
    pub client_sweep_interval: Duration,
    /// Shared secret a display must present to obtain a facilitator token.
    /// `None` leaves display streams open to anyone.
    pub display_secret: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        if let Ok(secret) = env::var(DISPLAY_SECRET_ENV) {
            config.display_secret = Some(secret).filter(|secret| !secret.is_empty());
        }
        if config.display_secret.is_none() {
            warn!("no display secret configured; any client may open a facilitator display");
        }
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        timer_secs = app_config.timer_duration.as_secs(),
                        keyword_limit = app_config.keyword_limit,
                        "loaded session settings from config"
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

    /// Cadences for the given role.
    pub fn intervals(&self, facilitator: bool) -> PollIntervals {
        if facilitator {
            self.facilitator
        } else {
            self.participant
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    timer_duration_secs: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    participant_step_poll_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    facilitator_step_poll_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    timer_poll_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    participant_poll_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    facilitator_poll_ms: Duration,
    keyword_limit: usize,
    recap_keyword_limit: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    reveal_delay_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    board_cooldown_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    change_poll_interval_ms: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    client_idle_ttl_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    client_sweep_interval_secs: Duration,
    display_secret: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            timer_duration_secs: Duration::from_secs(60),
            participant_step_poll_ms: Duration::from_secs(3),
            facilitator_step_poll_ms: Duration::from_secs(1),
            timer_poll_ms: Duration::from_secs(1),
            participant_poll_ms: Duration::from_secs(3),
            facilitator_poll_ms: Duration::from_secs(2),
            keyword_limit: 15,
            recap_keyword_limit: 30,
            reveal_delay_ms: Duration::from_millis(500),
            board_cooldown_ms: Duration::from_secs(3),
            change_poll_interval_ms: Duration::from_secs(2),
            client_idle_ttl_secs: Duration::from_secs(6 * 60 * 60),
            client_sweep_interval_secs: Duration::from_secs(10 * 60),
            display_secret: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            timer_duration: value.timer_duration_secs,
            participant: PollIntervals {
                step: value.participant_step_poll_ms,
                timer: value.timer_poll_ms,
                aggregates: value.participant_poll_ms,
                realtime_fallback: None,
            },
            facilitator: PollIntervals {
                step: value.facilitator_step_poll_ms,
                timer: value.timer_poll_ms,
                aggregates: value.facilitator_poll_ms,
                realtime_fallback: Some(value.facilitator_poll_ms),
            },
            keyword_limit: value.keyword_limit.max(1),
            recap_keyword_limit: value.recap_keyword_limit,
            reveal_delay: value.reveal_delay_ms,
            board_cooldown: value.board_cooldown_ms,
            change_poll_interval: value.change_poll_interval_ms,
            client_idle_ttl: value.client_idle_ttl_secs,
            client_sweep_interval: value.client_sweep_interval_secs.max(Duration::from_secs(1)),
            display_secret: value.display_secret.filter(|secret| !secret.is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
