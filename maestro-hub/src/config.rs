//! Configuration system for the Maestro hub server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/maestro-hub/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

/// Errors that can occur when loading hub configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the hub.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the hub config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_payload_size: Option<usize>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the hub server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Maestro relay hub server")]
pub struct HubCliArgs {
    /// Address to bind the hub server to.
    #[arg(short, long, env = "MAESTRO_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/maestro-hub/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum payload size in bytes.
    #[arg(long)]
    pub max_payload_size: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "MAESTRO_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved hub server configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:3000`).
    pub bind_addr: String,
    /// Maximum allowed payload size in bytes.
    pub max_payload_size: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_payload_size: 64 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `HubConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &HubCliArgs, file: &HubConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_payload_size: cli
                .max_payload_size
                .or(file.server.max_payload_size)
                .unwrap_or(defaults.max_payload_size),
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the hub.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<HubConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(HubConfigFile::default());
        };
        config_dir.join("maestro-hub").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
