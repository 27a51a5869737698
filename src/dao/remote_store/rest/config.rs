use std::time::Duration;

use super::error::{RestDaoError, RestResult};

const DEFAULT_CHANGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Runtime configuration describing how to reach the hosted store's REST endpoint.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the REST API, e.g. `https://project.example.co/rest/v1`.
    pub base_url: String,
    /// Anonymous API key sent as `apikey` and bearer token.
    pub api_key: Option<String>,
    /// How often change subscriptions re-read the subscribed rows.
    pub change_poll_interval: Duration,
}

impl RestConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            change_poll_interval: DEFAULT_CHANGE_POLL_INTERVAL,
        }
    }

    /// Attach the API key used for both `apikey` and `Authorization` headers.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the change-feed polling interval.
    pub fn with_change_poll_interval(mut self, interval: Duration) -> Self {
        self.change_poll_interval = interval;
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> RestResult<Self> {
        let base_url = std::env::var("STORE_BASE_URL").map_err(|_| RestDaoError::MissingEnvVar {
            var: "STORE_BASE_URL",
        })?;

        let mut config = Self::new(base_url);
        if let Ok(api_key) = std::env::var("STORE_API_KEY") {
            config = config.with_api_key(api_key);
        }

        Ok(config)
    }
}
