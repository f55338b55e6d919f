use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sweeper: SweeperSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperSettings {
    /// Seconds between background sweep runs.
    pub interval_seconds: u64,
    /// How long one sweeper instance holds an attempt's reconcile lock.
    #[serde(default = "default_lock_seconds")]
    pub lock_seconds: u64,
    /// Attempts are failed terminally (`verify_exhausted`) after this
    /// many verification tries.
    #[serde(default = "default_max_verify_attempts")]
    pub max_verify_attempts: u32,
    /// Bounded timeout per provider verification call.
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
}

fn default_lock_seconds() -> u64 {
    120
}

fn default_max_verify_attempts() -> u32 {
    8
}

fn default_verify_timeout_ms() -> u64 {
    5_000
}

fn default_batch_limit() -> u32 {
    50
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `STAYLINE_SERVER__PORT=9000` overrides `server.port`.
            .add_source(config::Environment::with_prefix("STAYLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
