// SPDX-License-Identifier: MIT
//! Health runner: executes the registered checks in order and aggregates
//! their results into a [`HealthReport`].
//!
//! Checks run one after another, each inside its own task with a timeout,
//! so a hung external query or a panicking check degrades to a Warn result
//! instead of taking down the whole run. Result order always follows
//! registration order.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::checks::{
    ContainerCheck, CpuLoadCheck, DefinitionsCheck, DiskCheck, HealthCheck, MemoryCheck,
    ServiceCheck, UpdatesCheck,
};
use super::report::{CheckResult, HealthReport};
use super::system::{AptSource, DockerCliSource, FileAgeSource, SysinfoSource, SystemdSource};
use crate::config::HealthConfig;

/// Which subset of the registry to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthMode {
    /// Core checks only: services, disk, memory, cpu.
    Brief,
    /// Core checks plus containers, definitions, and pending updates.
    Full,
}

struct Entry {
    name: &'static str,
    check: Arc<dyn HealthCheck>,
    full_only: bool,
}

/// Ordered check registry.
pub struct HealthRunner {
    entries: Vec<Entry>,
    check_timeout: Duration,
}

impl HealthRunner {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            check_timeout: Duration::from_secs(10),
        }
    }

    /// Wire up the live system sources in the fixed registration order.
    pub fn from_config(cfg: &HealthConfig) -> Self {
        let sysinfo = Arc::new(SysinfoSource);
        Self::new()
            .with_timeout(Duration::from_secs(cfg.check_timeout_secs))
            .with_check(ServiceCheck::new(
                cfg.services.clone(),
                Arc::new(SystemdSource),
            ))
            .with_check(DiskCheck::new(
                sysinfo.clone(),
                cfg.disk_warn_percent,
                cfg.mount_prefix.clone(),
                cfg.mount_exclude.clone(),
            ))
            .with_check(MemoryCheck::new(sysinfo.clone(), cfg.memory_warn_percent))
            .with_check(CpuLoadCheck::new(sysinfo, cfg.cpu_warn_percent))
            .with_full_check(ContainerCheck::new(Arc::new(DockerCliSource)))
            .with_full_check(DefinitionsCheck::new(
                Arc::new(FileAgeSource::new(cfg.definitions_path.clone())),
                cfg.definitions_max_age_days,
            ))
            .with_full_check(UpdatesCheck::new(Arc::new(AptSource)))
    }

    /// Cap the wall-clock time of each individual check.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Register a check that runs in both modes.
    pub fn with_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.entries.push(Entry {
            name: check.name(),
            check: Arc::new(check),
            full_only: false,
        });
        self
    }

    /// Register a check that only runs in [`HealthMode::Full`].
    pub fn with_full_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.entries.push(Entry {
            name: check.name(),
            check: Arc::new(check),
            full_only: true,
        });
        self
    }

    /// Run the registered checks for `mode` and aggregate the results.
    pub async fn run(&self, mode: HealthMode) -> HealthReport {
        let selected: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| mode == HealthMode::Full || !e.full_only)
            .collect();
        debug!(count = selected.len(), ?mode, "running health checks");

        let mut results: Vec<CheckResult> = Vec::new();
        for entry in selected {
            let check = Arc::clone(&entry.check);
            let mut handle = tokio::spawn(async move { check.run().await });
            match tokio::time::timeout(self.check_timeout, &mut handle).await {
                Ok(Ok(batch)) => results.extend(batch),
                Ok(Err(e)) => {
                    results.push(CheckResult::warn(
                        entry.name,
                        format!("check panicked: {e}"),
                    ));
                }
                Err(_) => {
                    handle.abort();
                    results.push(CheckResult::warn(entry.name, "check timed out"));
                }
            }
        }

        HealthReport::new(results)
    }
}

impl Default for HealthRunner {
    fn default() -> Self {
        Self::new()
    }
}
