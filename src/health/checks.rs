// SPDX-License-Identifier: MIT
//! Individual health check implementations.
//!
//! Each check implements [`HealthCheck`], interprets typed values from its
//! source against the configured policy, and never propagates an error: a
//! failed subsystem query degrades to a Warn result with an explanatory
//! message. Probes that expand to several inspected units (one per service,
//! one per mount) return one result each, preserving per-unit diagnosability.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::report::CheckResult;
use super::sources::{
    ContainerSource, CpuLoadSource, DefinitionsSource, DiskUsageSource, MemorySource,
    PendingUpdates, ServiceStatusSource, UpdatesSource,
};

/// One registered health check.
///
/// `run` is infallible by contract; blocking probes are moved onto the
/// blocking thread pool inside the implementations.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Stable identifier used for timeout/panic degradation messages.
    fn name(&self) -> &'static str;
    /// Evaluate and return one result per inspected unit.
    async fn run(&self) -> Vec<CheckResult>;
}

/// Run a blocking probe on the blocking pool, degrading pool failures to Warn.
async fn probe<T, F>(name: &'static str, f: F) -> Result<T, CheckResult>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CheckResult::warn(name, format!("query failed: {e}"))),
        Err(e) => Err(CheckResult::warn(name, format!("probe aborted: {e}"))),
    }
}

// ─── Service status ───────────────────────────────────────────────────────────

/// FAIL for each configured unit that is not currently active.
pub struct ServiceCheck {
    units: Vec<String>,
    source: Arc<dyn ServiceStatusSource>,
}

impl ServiceCheck {
    pub fn new(units: Vec<String>, source: Arc<dyn ServiceStatusSource>) -> Self {
        Self { units, source }
    }
}

#[async_trait]
impl HealthCheck for ServiceCheck {
    fn name(&self) -> &'static str {
        "services"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let name = format!("service:{unit}");
            let source = Arc::clone(&self.source);
            let unit_owned = unit.clone();
            let probed =
                tokio::task::spawn_blocking(move || source.is_active(&unit_owned)).await;
            results.push(match probed {
                Ok(Ok(true)) => CheckResult::ok(name, "active"),
                Ok(Ok(false)) => CheckResult::fail(name, "inactive"),
                Ok(Err(e)) => CheckResult::warn(name, format!("query failed: {e}")),
                Err(e) => CheckResult::warn(name, format!("probe aborted: {e}")),
            });
        }
        results
    }
}

// ─── Disk usage ───────────────────────────────────────────────────────────────

/// WARN for each checked mount at or above the used-space threshold.
pub struct DiskCheck {
    source: Arc<dyn DiskUsageSource>,
    warn_percent: u8,
    mount_prefix: PathBuf,
    mount_exclude: Vec<PathBuf>,
}

impl DiskCheck {
    pub fn new(
        source: Arc<dyn DiskUsageSource>,
        warn_percent: u8,
        mount_prefix: PathBuf,
        mount_exclude: Vec<PathBuf>,
    ) -> Self {
        Self {
            source,
            warn_percent,
            mount_prefix,
            mount_exclude,
        }
    }
}

#[async_trait]
impl HealthCheck for DiskCheck {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let mounts = match probe(self.name(), move || source.mounts()).await {
            Ok(mounts) => mounts,
            Err(degraded) => return vec![degraded],
        };

        mounts
            .iter()
            .filter(|m| m.mount_point.starts_with(&self.mount_prefix))
            .filter(|m| !self.mount_exclude.iter().any(|ex| m.mount_point.starts_with(ex)))
            .map(|m| {
                let pct = m.percent_used();
                let name = format!("disk:{}", m.mount_point.display());
                let message = format!(
                    "{pct:.0}% full ({:.1} GiB of {:.1} GiB)",
                    m.used_bytes as f64 / GIB,
                    m.total_bytes as f64 / GIB
                );
                if pct >= self.warn_percent as f64 {
                    CheckResult::warn(name, message)
                } else {
                    CheckResult::ok(name, message)
                }
            })
            .collect()
    }
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// ─── Memory ───────────────────────────────────────────────────────────────────

/// WARN when used/total memory reaches the threshold. Single result.
pub struct MemoryCheck {
    source: Arc<dyn MemorySource>,
    warn_percent: u8,
}

impl MemoryCheck {
    pub fn new(source: Arc<dyn MemorySource>, warn_percent: u8) -> Self {
        Self { source, warn_percent }
    }
}

#[async_trait]
impl HealthCheck for MemoryCheck {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let usage = match probe(self.name(), move || source.memory()).await {
            Ok(usage) => usage,
            Err(degraded) => return vec![degraded],
        };
        let pct = usage.percent_used();
        let message = format!(
            "{pct:.0}% used ({:.1} GiB of {:.1} GiB)",
            usage.used_bytes as f64 / GIB,
            usage.total_bytes as f64 / GIB
        );
        vec![if pct >= self.warn_percent as f64 {
            CheckResult::warn(self.name(), message)
        } else {
            CheckResult::ok(self.name(), message)
        }]
    }
}

// ─── CPU load ─────────────────────────────────────────────────────────────────

/// WARN when the normalized 1-minute load average reaches the threshold.
pub struct CpuLoadCheck {
    source: Arc<dyn CpuLoadSource>,
    warn_percent: u8,
}

impl CpuLoadCheck {
    pub fn new(source: Arc<dyn CpuLoadSource>, warn_percent: u8) -> Self {
        Self { source, warn_percent }
    }
}

#[async_trait]
impl HealthCheck for CpuLoadCheck {
    fn name(&self) -> &'static str {
        "cpu"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let load = match probe(self.name(), move || source.load()).await {
            Ok(load) => load,
            Err(degraded) => return vec![degraded],
        };
        let pct = load.normalized_percent();
        let message = format!(
            "load {:.2} across {} core(s) ({pct:.0}%)",
            load.one_minute, load.cores
        );
        vec![if pct >= self.warn_percent as f64 {
            CheckResult::warn(self.name(), message)
        } else {
            CheckResult::ok(self.name(), message)
        }]
    }
}

// ─── Container health ─────────────────────────────────────────────────────────

/// FAIL for each running container that is not running-and-healthy.
/// Zero running containers is OK, not a failure.
pub struct ContainerCheck {
    source: Arc<dyn ContainerSource>,
}

impl ContainerCheck {
    pub fn new(source: Arc<dyn ContainerSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl HealthCheck for ContainerCheck {
    fn name(&self) -> &'static str {
        "containers"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let containers = match probe(self.name(), move || source.containers()).await {
            Ok(containers) => containers,
            Err(degraded) => return vec![degraded],
        };
        if containers.is_empty() {
            return vec![CheckResult::ok(self.name(), "no containers running")];
        }
        containers
            .iter()
            .map(|c| {
                let name = format!("container:{}", c.name);
                match (&c.health, c.is_healthy()) {
                    (_, true) => {
                        let detail = match &c.health {
                            Some(h) => format!("running ({h})"),
                            None => "running".to_string(),
                        };
                        CheckResult::ok(name, detail)
                    }
                    (Some(h), false) => {
                        CheckResult::fail(name, format!("{} ({h})", c.state))
                    }
                    (None, false) => CheckResult::fail(name, c.state.clone()),
                }
            })
            .collect()
    }
}

// ─── Security definitions ─────────────────────────────────────────────────────

/// WARN when the antivirus definition file is stale or missing.
pub struct DefinitionsCheck {
    source: Arc<dyn DefinitionsSource>,
    max_age_days: u64,
}

impl DefinitionsCheck {
    pub fn new(source: Arc<dyn DefinitionsSource>, max_age_days: u64) -> Self {
        Self { source, max_age_days }
    }
}

#[async_trait]
impl HealthCheck for DefinitionsCheck {
    fn name(&self) -> &'static str {
        "definitions"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let age = match probe(self.name(), move || source.age()).await {
            Ok(age) => age,
            Err(degraded) => return vec![degraded],
        };
        vec![match age {
            None => CheckResult::warn(self.name(), "definition file not found"),
            Some(age) => {
                let days = age.as_secs() / 86_400;
                if days > self.max_age_days {
                    CheckResult::warn(self.name(), format!("definitions are {days} day(s) old"))
                } else {
                    CheckResult::ok(self.name(), format!("definitions are {days} day(s) old"))
                }
            }
        }]
    }
}

// ─── Pending updates ──────────────────────────────────────────────────────────

/// WARN when package updates are available. A missing update tool is OK.
pub struct UpdatesCheck {
    source: Arc<dyn UpdatesSource>,
}

impl UpdatesCheck {
    pub fn new(source: Arc<dyn UpdatesSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl HealthCheck for UpdatesCheck {
    fn name(&self) -> &'static str {
        "updates"
    }

    async fn run(&self) -> Vec<CheckResult> {
        let source = Arc::clone(&self.source);
        let pending = match probe(self.name(), move || source.pending()).await {
            Ok(pending) => pending,
            Err(degraded) => return vec![degraded],
        };
        vec![match pending {
            PendingUpdates::Counted(0) => CheckResult::ok(self.name(), "system is up to date"),
            PendingUpdates::Counted(n) => {
                CheckResult::warn(self.name(), format!("{n} package update(s) available"))
            }
            PendingUpdates::Unavailable(msg) => CheckResult::ok(self.name(), msg),
        }]
    }
}
