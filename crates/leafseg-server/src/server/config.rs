//! Command line and configuration file handling.

use anyhow::bail;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command line for the `leafseg-server` binary.
#[derive(Parser, Debug)]
#[command(
    name = "leafseg-server",
    version,
    about = "HTTP service for leaf-segment ID allocation"
)]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    ///
    /// Environment variable: `LEAFSEG_CONFIG`
    #[arg(long, env = "LEAFSEG_CONFIG", default_value = "./allocate.json")]
    pub config: PathBuf,
}

/// Service configuration, loaded from a JSON file.
///
/// Unrecognized keys are ignored so a config file can be shared with other
/// tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Store location: a SQLite database path, or `:memory:`.
    pub dsn: String,

    /// Segments table name; must be a bare SQL identifier.
    #[serde(default = "default_table")]
    pub table: String,

    /// Listen port.
    pub http_port: u16,

    /// Read deadline for inbound requests, milliseconds. 0 disables it.
    #[serde(default)]
    pub http_read_timeout: u64,

    /// Write deadline for responses, milliseconds. 0 disables it.
    #[serde(default)]
    pub http_write_timeout: u64,

    /// Add wall-clock milliseconds to raw IDs before returning them.
    /// Disabling keeps the raw trend-increasing sequence.
    #[serde(default = "default_compose_clock")]
    pub compose_clock: bool,
}

fn default_table() -> String {
    "segments".to_string()
}

fn default_compose_clock() -> bool {
    true
}

impl ServiceConfig {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.dsn.is_empty() {
            bail!("dsn must not be empty");
        }
        if self.http_port == 0 {
            bail!("http_port must be non-zero");
        }
        Ok(())
    }
}
