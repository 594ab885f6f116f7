use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/state.json";
const DEVICE_ID_FILE: &str = "device_id";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub auth_redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub device_id_path: PathBuf,
    pub session_path: PathBuf,
    /// `None` keeps snapshots in process memory and disables sign-in.
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = non_empty("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_path = non_empty("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let device_id_path = non_empty("APP_DEVICE_ID_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_path.with_file_name(DEVICE_ID_FILE));
        let session_path = non_empty("APP_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| device_id_path.with_file_name(SESSION_FILE));

        let remote = match (non_empty("LC_REMOTE_URL"), non_empty("LC_REMOTE_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url,
                api_key,
                auth_redirect: non_empty("LC_AUTH_REDIRECT"),
            }),
            _ => None,
        };

        Self {
            port,
            data_path,
            device_id_path,
            session_path,
            remote,
        }
    }
}
