use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::backup::manifest::{default_manifest, ManifestEntry};

const DEFAULT_DISK_WARN_PERCENT: u8 = 80;
const DEFAULT_MEMORY_WARN_PERCENT: u8 = 85;
const DEFAULT_CPU_WARN_PERCENT: u8 = 90;
const DEFAULT_DEFINITIONS_MAX_AGE_DAYS: u64 = 7;
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETENTION_DAYS: u64 = 7;
const DEFAULT_BACKUP_DESTINATION: &str = "/var/backups/config";
const DEFAULT_DEFINITIONS_PATH: &str = "/var/lib/clamav/daily.cvd";

// ─── HealthConfig ─────────────────────────────────────────────────────────────

/// Health check thresholds and probe targets (`[health]` in opsbox.toml).
///
/// Every field has a default, so a partial (or absent) config file works.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Service units whose active state is checked. One result per unit.
    pub services: Vec<String>,
    /// Warn when a mount's used space reaches this percentage.
    pub disk_warn_percent: u8,
    /// Only mounts under this prefix are checked.
    pub mount_prefix: PathBuf,
    /// Mounts under any of these prefixes are skipped (boot partitions etc.).
    pub mount_exclude: Vec<PathBuf>,
    /// Warn when used/total memory reaches this percentage.
    pub memory_warn_percent: u8,
    /// Warn when the 1-minute load average, normalized by core count,
    /// reaches this percentage.
    pub cpu_warn_percent: u8,
    /// Antivirus definition file whose age is checked in full mode.
    pub definitions_path: PathBuf,
    /// Warn when the definition file is older than this many days.
    pub definitions_max_age_days: u64,
    /// A check that has not finished after this many seconds is recorded
    /// as a warning and the run moves on.
    pub check_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            services: vec![
                "smbd".to_string(),
                "prometheus".to_string(),
                "grafana-server".to_string(),
                "fail2ban".to_string(),
                "docker".to_string(),
            ],
            disk_warn_percent: DEFAULT_DISK_WARN_PERCENT,
            mount_prefix: PathBuf::from("/"),
            mount_exclude: vec![PathBuf::from("/boot")],
            memory_warn_percent: DEFAULT_MEMORY_WARN_PERCENT,
            cpu_warn_percent: DEFAULT_CPU_WARN_PERCENT,
            definitions_path: PathBuf::from(DEFAULT_DEFINITIONS_PATH),
            definitions_max_age_days: DEFAULT_DEFINITIONS_MAX_AGE_DAYS,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
        }
    }
}

// ─── BackupConfig ─────────────────────────────────────────────────────────────

/// Backup destination, retention window, and manifest (`[backup]` in opsbox.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory that receives the archives and their checksum files.
    pub destination: PathBuf,
    /// Archives whose modification time is older than this many days are
    /// deleted after each run.
    pub retention_days: u64,
    /// Ordered list of source paths and their locations inside the archive.
    /// Order is part of the contract: archive contents and log output are
    /// reproducible across runs.
    pub manifest: Vec<ManifestEntry>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_BACKUP_DESTINATION),
            retention_days: DEFAULT_RETENTION_DAYS,
            manifest: default_manifest(),
        }
    }
}

// ─── OpsConfig ────────────────────────────────────────────────────────────────

/// Top-level opsbox configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OpsConfig {
    pub health: HealthConfig,
    pub backup: BackupConfig,
}

impl OpsConfig {
    /// Load configuration from `path`, or return defaults.
    ///
    /// A missing file is not an error; defaults apply and a debug line is
    /// logged. A file that exists but fails to parse is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_documented_thresholds() {
        let cfg = OpsConfig::default();
        assert_eq!(cfg.health.disk_warn_percent, 80);
        assert_eq!(cfg.health.memory_warn_percent, 85);
        assert_eq!(cfg.health.cpu_warn_percent, 90);
        assert_eq!(cfg.health.definitions_max_age_days, 7);
        assert_eq!(cfg.backup.retention_days, 7);
        assert!(!cfg.backup.manifest.is_empty());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: OpsConfig = toml::from_str(
            r#"
            [health]
            disk_warn_percent = 70
            services = ["nginx"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.health.disk_warn_percent, 70);
        assert_eq!(cfg.health.services, vec!["nginx".to_string()]);
        // untouched fields keep their defaults
        assert_eq!(cfg.health.memory_warn_percent, 85);
        assert_eq!(cfg.backup.retention_days, 7);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cfg = OpsConfig::load(Some(Path::new("/nonexistent/opsbox.toml"))).unwrap();
        assert_eq!(cfg.health.disk_warn_percent, 80);
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opsbox.toml");
        std::fs::write(&path, "health = \"not a table\"").unwrap();
        assert!(OpsConfig::load(Some(&path)).is_err());
    }
}
