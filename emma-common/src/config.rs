//! Configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`EMMA_ROOT_FOLDER`, `EMMA_CONFIG`, provider API keys)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is never fatal: both binaries log a warning and start
//! with compiled defaults. A TOML file that exists but does not parse is a
//! configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EMMA_ROOT_FOLDER";

/// Environment variable overriding the TOML config file location
pub const CONFIG_PATH_ENV: &str = "EMMA_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; absent keys take compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding `data/` and `sources/`
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
    pub fusion: FusionConfig,
    pub generation: GenerationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Dashboard snapshot server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    /// Maximum snapshot age before a read triggers a synchronous refresh
    pub snapshot_ttl_secs: u64,
    /// Background full-refresh period
    pub refresh_interval_secs: u64,
    /// Filename suffix selecting fusion artifacts for the "latest" lookup
    pub report_suffix: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
            snapshot_ttl_secs: 600,
            refresh_interval_secs: 600,
            report_suffix: ".md".to_string(),
        }
    }
}

/// Fusion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Module identifier embedded in artifact names
    pub module: String,
    /// Directory name under `sources/` holding `segment_NN.md` files
    pub source_document: String,
    /// Expected number of segments; discovered from disk when absent
    pub expected_segments: Option<u32>,
    /// Source text beyond this many characters is cut before prompting
    pub max_segment_chars: usize,
    pub call_timeout_secs: u64,
    /// Attempts per segment, including the first call
    pub max_attempts: u32,
    /// Stop the run at the first failed segment; `false` records the
    /// failure and continues with later segments
    pub fail_fast: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            module: "openai".to_string(),
            source_document: "mena_horizon_2030".to_string(),
            expected_segments: None,
            max_segment_chars: 4000,
            call_timeout_secs: 90,
            max_attempts: 3,
            fail_fast: true,
        }
    }
}

/// Upstream generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// "openai" or "gemini"
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key: None,
        }
    }
}

/// Default configuration file location (`<config dir>/emma/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("emma").join("config.toml"))
}

/// Pick the config file path: CLI argument, then `EMMA_CONFIG`, then the platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load the TOML configuration, degrading to defaults when the file is absent
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file location available, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Root folder resolution: CLI argument, env var, TOML key, OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("emma"))
        .unwrap_or_else(|| PathBuf::from("./emma_data"))
}

/// Well-known paths under the root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Division/status index read by the status snapshot
    pub fn memo_index_path(&self) -> PathBuf {
        self.data_dir().join("memo_index.json")
    }

    /// Revenue figures read by the revenue snapshot
    pub fn revenue_snapshot_path(&self) -> PathBuf {
        self.data_dir().join("revenue_snapshot.json")
    }

    /// Directory receiving fusion artifacts
    pub fn fusion_reports_dir(&self) -> PathBuf {
        self.data_dir().join("fusion_reports")
    }

    /// Directory holding `segment_NN.md` files for one source document
    pub fn segments_dir(&self, document: &str) -> PathBuf {
        self.root.join("sources").join(document)
    }

    /// Create the data and reports directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        let reports = self.fusion_reports_dir();
        if !reports.exists() {
            info!("Creating fusion reports directory: {}", reports.display());
        }
        std::fs::create_dir_all(&reports)?;
        Ok(())
    }
}
