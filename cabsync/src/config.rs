use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use cabinet_core::Passport;

const DEFAULT_STATE_DIR_NAME: &str = "cabsync";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the remote service, read from the environment
/// (a `.env` file is honored by the binary before this runs).
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub passport: Passport,
    pub default_folder_id: Option<String>,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("CABSYNC_ENDPOINT").context("CABSYNC_ENDPOINT is not set")?;
        let email = std::env::var("CABSYNC_EMAIL").context("CABSYNC_EMAIL is not set")?;
        let password = std::env::var("CABSYNC_PASSWORD").context("CABSYNC_PASSWORD is not set")?;
        let account = std::env::var("CABSYNC_ACCOUNT").context("CABSYNC_ACCOUNT is not set")?;
        let role = std::env::var("CABSYNC_ROLE").ok();
        let default_folder_id = std::env::var("CABSYNC_FOLDER_ID").ok();
        let request_timeout = Duration::from_secs(read_u64_env(
            "CABSYNC_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));

        Ok(Self {
            endpoint,
            passport: Passport {
                email,
                password,
                account,
                role,
            },
            default_folder_id,
            request_timeout,
        })
    }
}

/// Directory holding the persisted folder cache.
pub fn state_dir() -> PathBuf {
    std::env::var("CABSYNC_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_state_dir())
}

fn default_state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_STATE_DIR_NAME)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
