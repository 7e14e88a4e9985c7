// SPDX-License-Identifier: MIT
//! Typed adapter traits over the external subsystems the checks query.
//!
//! Threshold logic never parses raw tool output; each trait returns typed
//! values, so the checks can be tested against fakes without a service
//! manager, container engine, or package tool on the machine. Live
//! implementations live in [`super::system`].

use std::path::PathBuf;
use std::time::Duration;

/// Queries whether a service unit is currently active.
pub trait ServiceStatusSource: Send + Sync {
    fn is_active(&self, unit: &str) -> anyhow::Result<bool>;
}

/// Usage of one mounted filesystem.
#[derive(Debug, Clone)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl MountUsage {
    /// Percent of total space in use. A zero-sized mount reads as 0%.
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Enumerates mounted filesystems with their usage.
pub trait DiskUsageSource: Send + Sync {
    fn mounts(&self) -> anyhow::Result<Vec<MountUsage>>;
}

/// System memory usage.
#[derive(Debug, Clone, Copy)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl MemoryUsage {
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
    }
}

pub trait MemorySource: Send + Sync {
    fn memory(&self) -> anyhow::Result<MemoryUsage>;
}

/// 1-minute load average and the core count used to normalize it.
#[derive(Debug, Clone, Copy)]
pub struct CpuLoad {
    pub one_minute: f64,
    pub cores: usize,
}

impl CpuLoad {
    /// Load average as a percentage of full utilization across all cores.
    pub fn normalized_percent(&self) -> f64 {
        (self.one_minute / self.cores.max(1) as f64) * 100.0
    }
}

pub trait CpuLoadSource: Send + Sync {
    fn load(&self) -> anyhow::Result<CpuLoad>;
}

/// Runtime state of one container as reported by the engine.
#[derive(Debug, Clone)]
pub struct ContainerState {
    pub name: String,
    /// Engine state string, `"running"` when up.
    pub state: String,
    /// Health probe verdict, if the container defines one.
    pub health: Option<String>,
}

impl ContainerState {
    /// Running, and either no health probe or a healthy one.
    pub fn is_healthy(&self) -> bool {
        self.state == "running" && self.health.as_deref().map_or(true, |h| h == "healthy")
    }
}

/// Enumerates currently running containers.
pub trait ContainerSource: Send + Sync {
    fn containers(&self) -> anyhow::Result<Vec<ContainerState>>;
}

/// Age of the security definition file. `None` means the file does not exist.
pub trait DefinitionsSource: Send + Sync {
    fn age(&self) -> anyhow::Result<Option<Duration>>;
}

/// Result of querying the package tool for pending updates.
#[derive(Debug, Clone)]
pub enum PendingUpdates {
    /// The tool ran and reported this many upgradable packages.
    Counted(usize),
    /// The tool is not installed; the message explains what was probed.
    Unavailable(String),
}

pub trait UpdatesSource: Send + Sync {
    fn pending(&self) -> anyhow::Result<PendingUpdates>;
}
