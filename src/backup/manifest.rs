// SPDX-License-Identifier: MIT
//! Backup manifest: which paths get archived, and where they land.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One source-to-destination mapping. Static configuration, never mutated
/// at runtime; the source path may be absent on a given host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Absolute path on the host (file or directory).
    pub source: PathBuf,
    /// Relative destination path inside the staged archive tree.
    pub archive_path: String,
}

impl ManifestEntry {
    pub fn new(source: impl Into<PathBuf>, archive_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            archive_path: archive_path.into(),
        }
    }
}

/// The default set of configuration paths worth preserving.
///
/// The order is fixed; archive contents and log output follow it exactly.
/// Paths that do not exist on a host are skipped at run time.
pub fn default_manifest() -> Vec<ManifestEntry> {
    vec![
        ManifestEntry::new("/etc/samba/smb.conf", "samba/smb.conf"),
        ManifestEntry::new("/etc/prometheus", "prometheus"),
        ManifestEntry::new("/etc/grafana", "grafana"),
        ManifestEntry::new("/etc/alertmanager", "alertmanager"),
        ManifestEntry::new("/etc/fail2ban/jail.local", "fail2ban/jail.local"),
        ManifestEntry::new("/etc/clamav", "clamav"),
        ManifestEntry::new("/etc/ssh/sshd_config", "ssh/sshd_config"),
        ManifestEntry::new("/opt/monitoring/docker-compose.yml", "monitoring/docker-compose.yml"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_is_ordered_and_relative() {
        let manifest = default_manifest();
        assert!(manifest.len() >= 5);
        for entry in &manifest {
            assert!(entry.source.is_absolute(), "{:?}", entry.source);
            assert!(
                !entry.archive_path.starts_with('/'),
                "archive path must be relative: {}",
                entry.archive_path
            );
        }
        // first entry is stable; reordering would change archive layout
        assert_eq!(manifest[0].archive_path, "samba/smb.conf");
    }
}
