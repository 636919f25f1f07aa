use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Debug, Args)]
pub struct Config {
    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct StoreConfig {
    /// Directory holding the application's private settings
    #[arg(long, env = "PUSH_REGISTRAR_DATA_DIR", default_value = ".push-registrar")]
    pub data_dir: PathBuf,

    /// Name of the settings suite file inside the data directory
    #[arg(long, env = "PUSH_REGISTRAR_SUITE_NAME", default_value = "push-registrar")]
    pub suite_name: String,

    /// Key under which provider configs are stored
    #[arg(long, env = "PUSH_REGISTRAR_CONFIGS_KEY", default_value = crate::core::DEFAULT_CONFIGS_KEY)]
    pub configs_key: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "PUSH_REGISTRAR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Default log filter, used when RUST_LOG is unset
    #[arg(long, env = "PUSH_REGISTRAR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { log_format: LogFormat::Text, log_level: "info".to_owned() }
    }
}
