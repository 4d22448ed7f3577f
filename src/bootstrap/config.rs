//! # Configuration Loader / 配置加载器
//!
//! Reads the TOML configuration file into [`AppConfig`]. Missing tables and
//! keys fall back to defaults; values are not validated here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use pf_core::SyncConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "paperflow.toml";

/// `[logging]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset (e.g. "debug")
    pub level: Option<String>,
    /// Also write logs to `<log_dir>/paperflow.log`
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// - File cannot be read (I/O error)
/// - Content is not valid TOML or does not map onto [`AppConfig`]
pub fn load_config(config_path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

/// Default location: `<config_dir>/paperflow/paperflow.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paperflow").join(CONFIG_FILE_NAME))
}

/// Configuration plus the file it came from (`None` means built-in defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Report where the configuration came from. Call once tracing is up.
    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!(path = %path.display(), "Configuration loaded"),
            None => info!("No configuration file found, using defaults"),
        }
    }
}

/// Load `explicit` if given (it must exist), else the default location if it
/// exists, else defaults.
///
/// Runs before the tracing subscriber exists, so it does not log.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    resolve_config_from(explicit, default_config_path())
}

fn resolve_config_from(
    explicit: Option<&Path>,
    fallback: Option<PathBuf>,
) -> anyhow::Result<ResolvedConfig> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => fallback.filter(|path| path.exists()),
    };
    let config = match &source {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    Ok(ResolvedConfig { config, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config_reads_sync_and_logging_tables() {
        let file = write_config(
            r#"
            [sync]
            min_refresh_interval_ms = 1000
            redirect_on_completion = true
            detail_route_prefix = "/papers"

            [logging]
            level = "debug"
            log_dir = "/tmp/paperflow-logs"
            "#,
        );

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.sync.min_refresh_interval_ms, 1000);
        assert!(config.sync.redirect_on_completion);
        assert_eq!(config.sync.detail_route_prefix, "/papers");
        assert_eq!(config.sync.placeholder_grace_ms, pf_core::config::DEFAULT_PLACEHOLDER_GRACE_MS);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/tmp/paperflow-logs")));
    }

    #[test]
    fn test_load_config_empty_file_uses_defaults() {
        let file = write_config("");
        assert_eq!(load_config(file.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_config_rejects_invalid_toml() {
        let file = write_config("[sync\nmin_refresh_interval_ms = ");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_config_missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/paperflow.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_resolve_config_prefers_explicit_path() {
        let file = write_config("[sync]\nfeed_buffer = 4\n");
        let fallback = write_config("[sync]\nfeed_buffer = 9\n");
        let resolved =
            resolve_config_from(Some(file.path()), Some(fallback.path().to_path_buf())).unwrap();
        assert_eq!(resolved.config.sync.feed_buffer, 4);
        assert_eq!(resolved.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_resolve_config_reports_fallback_source() {
        let fallback = write_config("[sync]\nfeed_buffer = 9\n");
        let resolved = resolve_config_from(None, Some(fallback.path().to_path_buf())).unwrap();
        assert_eq!(resolved.config.sync.feed_buffer, 9);
        assert_eq!(resolved.source.as_deref(), Some(fallback.path()));
    }

    #[test]
    fn test_resolve_config_without_file_reports_defaults() {
        let missing = PathBuf::from("/nonexistent/paperflow.toml");
        let resolved = resolve_config_from(None, Some(missing)).unwrap();
        assert_eq!(resolved.config, AppConfig::default());
        assert_eq!(resolved.source, None);
    }

    #[test]
    fn test_resolve_config_explicit_missing_file_is_an_error() {
        let err = resolve_config_from(Some(Path::new("/nonexistent/explicit.toml")), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
