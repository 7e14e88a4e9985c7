// SPDX-License-Identifier: MIT
//! Live source implementations backed by the host system.
//!
//! These are the only places that invoke external tools or read kernel
//! statistics; everything above them works on the typed values from
//! [`super::sources`].

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, SystemTime};

use sysinfo::{Disks, System};
use tracing::debug;

use super::sources::{
    ContainerSource, ContainerState, CpuLoad, CpuLoadSource, DefinitionsSource, DiskUsageSource,
    MemorySource, MemoryUsage, MountUsage, PendingUpdates, ServiceStatusSource, UpdatesSource,
};

// ─── Service manager ──────────────────────────────────────────────────────────

/// Probes unit state via `systemctl is-active`.
pub struct SystemdSource;

impl ServiceStatusSource for SystemdSource {
    fn is_active(&self, unit: &str) -> anyhow::Result<bool> {
        let output = Command::new("systemctl")
            .args(["is-active", "--quiet", unit])
            .output()
            .map_err(|e| anyhow::anyhow!("systemctl unavailable: {e}"))?;
        // is-active exits 0 iff the unit is active; any other exit code
        // (inactive, failed, unknown unit) reads as not active.
        Ok(output.status.success())
    }
}

// ─── Memory / CPU / disks ─────────────────────────────────────────────────────

/// Kernel statistics via sysinfo: mounted disks, memory, load average.
pub struct SysinfoSource;

impl DiskUsageSource for SysinfoSource {
    fn mounts(&self) -> anyhow::Result<Vec<MountUsage>> {
        let disks = Disks::new_with_refreshed_list();
        let mut mounts: Vec<MountUsage> = disks
            .list()
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                MountUsage {
                    mount_point: disk.mount_point().to_path_buf(),
                    total_bytes: total,
                    used_bytes: total.saturating_sub(disk.available_space()),
                }
            })
            .collect();
        // Stable order regardless of enumeration order.
        mounts.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
        mounts.dedup_by(|a, b| a.mount_point == b.mount_point);
        Ok(mounts)
    }
}

impl MemorySource for SysinfoSource {
    fn memory(&self) -> anyhow::Result<MemoryUsage> {
        let mut sys = System::new();
        sys.refresh_memory();
        Ok(MemoryUsage {
            total_bytes: sys.total_memory(),
            used_bytes: sys.used_memory(),
        })
    }
}

impl CpuLoadSource for SysinfoSource {
    fn load(&self) -> anyhow::Result<CpuLoad> {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        Ok(CpuLoad {
            one_minute: System::load_average().one,
            cores: sys.cpus().len().max(1),
        })
    }
}

// ─── Container engine ─────────────────────────────────────────────────────────

/// Queries running containers via the docker CLI (`ps` + `inspect`).
pub struct DockerCliSource;

impl ContainerSource for DockerCliSource {
    fn containers(&self) -> anyhow::Result<Vec<ContainerState>> {
        let ps = Command::new("docker")
            .args(["ps", "-q", "--no-trunc"])
            .output()
            .map_err(|e| anyhow::anyhow!("docker unavailable: {e}"))?;
        if !ps.status.success() {
            anyhow::bail!(
                "docker ps failed: {}",
                String::from_utf8_lossy(&ps.stderr).trim()
            );
        }

        let ids: Vec<&str> = std::str::from_utf8(&ps.stdout)
            .unwrap_or("")
            .lines()
            .filter(|l| !l.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let inspect = Command::new("docker")
            .arg("inspect")
            .args(&ids)
            .output()
            .map_err(|e| anyhow::anyhow!("docker unavailable: {e}"))?;
        if !inspect.status.success() {
            anyhow::bail!(
                "docker inspect failed: {}",
                String::from_utf8_lossy(&inspect.stderr).trim()
            );
        }

        let parsed: serde_json::Value = serde_json::from_slice(&inspect.stdout)
            .map_err(|e| anyhow::anyhow!("unexpected docker inspect output: {e}"))?;
        let mut containers: Vec<ContainerState> = parsed
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|c| ContainerState {
                        name: c["Name"]
                            .as_str()
                            .unwrap_or("<unnamed>")
                            .trim_start_matches('/')
                            .to_string(),
                        state: c["State"]["Status"].as_str().unwrap_or("unknown").to_string(),
                        health: c["State"]["Health"]["Status"]
                            .as_str()
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = containers.len(), "inspected running containers");
        Ok(containers)
    }
}

// ─── Security definitions ─────────────────────────────────────────────────────

/// Age of a definition file, from its modification time.
pub struct FileAgeSource {
    path: PathBuf,
}

impl FileAgeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DefinitionsSource for FileAgeSource {
    fn age(&self) -> anyhow::Result<Option<Duration>> {
        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                anyhow::bail!("cannot stat {}: {e}", self.path.display());
            }
        };
        let modified = meta
            .modified()
            .map_err(|e| anyhow::anyhow!("cannot read mtime of {}: {e}", self.path.display()))?;
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default(),
        ))
    }
}

// ─── Package updates ──────────────────────────────────────────────────────────

/// Counts upgradable packages via a simulated `apt-get upgrade`.
pub struct AptSource;

impl UpdatesSource for AptSource {
    fn pending(&self) -> anyhow::Result<PendingUpdates> {
        let output = match Command::new("apt-get").args(["-s", "upgrade"]).output() {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Absence of the tool is not itself a failure.
                return Ok(PendingUpdates::Unavailable(
                    "apt-get not found, skipping update check".to_string(),
                ));
            }
            Err(e) => anyhow::bail!("apt-get failed to start: {e}"),
        };
        if !output.status.success() {
            anyhow::bail!(
                "apt-get -s upgrade failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let count = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| l.starts_with("Inst "))
            .count();
        Ok(PendingUpdates::Counted(count))
    }
}
