//! Profile defaults for the command line.
//!
//! A profile is an optional TOML file overlaid by `KCLI_*` environment
//! variables. Flags given on the command line always take precedence; the
//! library itself never reads the profile.

use crate::message::DisplayMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bootstrap_servers: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub print_opt: DisplayMode,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("KCLI")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("bootstrap_servers"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_group_id() -> String {
    "kcli-group".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}
