use crate::{AppError, AppResult};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_DATA_DIR: &str = ".logicleap";
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub data_dir: PathBuf,
    /// No stream timeout when `None`.
    pub stream_timeout: Option<Duration>,
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            stream_timeout: Some(DEFAULT_STREAM_TIMEOUT),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, after loading a `.env` file
    /// when one exists.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let stream_timeout = match var("LOGICLEAP_STREAM_TIMEOUT_SECS") {
            None => defaults.stream_timeout,
            Some(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    AppError::Config(format!(
                        "LOGICLEAP_STREAM_TIMEOUT_SECS must be a number of seconds, got {value:?}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        Ok(Self {
            api_key: var("GOOGLE_API_KEY").or_else(|| var("API_KEY")),
            model: var("LOGICLEAP_MODEL").unwrap_or(defaults.model),
            base_url: var("LOGICLEAP_BASE_URL"),
            data_dir: var("LOGICLEAP_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            stream_timeout,
            catalog_path: var("LOGICLEAP_CATALOG").map(PathBuf::from),
        })
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GOOGLE_API_KEY environment variable not set".into()))
    }
}
