//! Health runner tests against injected fake sources.
//!
//! No service manager, container engine, or package tool is touched; every
//! check gets a fake implementing its source trait.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsbox::health::checks::{
    ContainerCheck, CpuLoadCheck, DefinitionsCheck, DiskCheck, HealthCheck, MemoryCheck,
    ServiceCheck, UpdatesCheck,
};
use opsbox::health::report::{CheckResult, CheckStatus, Overall};
use opsbox::health::runner::{HealthMode, HealthRunner};
use opsbox::health::sources::{
    ContainerSource, ContainerState, CpuLoad, CpuLoadSource, DefinitionsSource, DiskUsageSource,
    MemorySource, MemoryUsage, MountUsage, PendingUpdates, ServiceStatusSource, UpdatesSource,
};

// ─── Fakes ────────────────────────────────────────────────────────────────────

struct StaticServices(Vec<(String, bool)>);

impl ServiceStatusSource for StaticServices {
    fn is_active(&self, unit: &str) -> anyhow::Result<bool> {
        self.0
            .iter()
            .find(|(u, _)| u == unit)
            .map(|(_, active)| *active)
            .ok_or_else(|| anyhow::anyhow!("unknown unit {unit}"))
    }
}

struct StaticDisks(Vec<MountUsage>);

impl DiskUsageSource for StaticDisks {
    fn mounts(&self) -> anyhow::Result<Vec<MountUsage>> {
        Ok(self.0.clone())
    }
}

struct StaticMemory(MemoryUsage);

impl MemorySource for StaticMemory {
    fn memory(&self) -> anyhow::Result<MemoryUsage> {
        Ok(self.0)
    }
}

struct StaticCpu(CpuLoad);

impl CpuLoadSource for StaticCpu {
    fn load(&self) -> anyhow::Result<CpuLoad> {
        Ok(self.0)
    }
}

struct StaticContainers(Vec<ContainerState>);

impl ContainerSource for StaticContainers {
    fn containers(&self) -> anyhow::Result<Vec<ContainerState>> {
        Ok(self.0.clone())
    }
}

struct StaticDefinitions(Option<Duration>);

impl DefinitionsSource for StaticDefinitions {
    fn age(&self) -> anyhow::Result<Option<Duration>> {
        Ok(self.0)
    }
}

struct StaticUpdates(PendingUpdates);

impl UpdatesSource for StaticUpdates {
    fn pending(&self) -> anyhow::Result<PendingUpdates> {
        Ok(self.0.clone())
    }
}

fn mount(path: &str, total: u64, used: u64) -> MountUsage {
    MountUsage {
        mount_point: PathBuf::from(path),
        total_bytes: total,
        used_bytes: used,
    }
}

/// A runner over an all-healthy fake system, with all seven checks.
fn healthy_runner() -> HealthRunner {
    HealthRunner::new()
        .with_check(ServiceCheck::new(
            vec!["smbd".to_string(), "docker".to_string()],
            Arc::new(StaticServices(vec![
                ("smbd".to_string(), true),
                ("docker".to_string(), true),
            ])),
        ))
        .with_check(DiskCheck::new(
            Arc::new(StaticDisks(vec![mount("/", 100, 40), mount("/var", 100, 50)])),
            80,
            PathBuf::from("/"),
            vec![PathBuf::from("/boot")],
        ))
        .with_check(MemoryCheck::new(
            Arc::new(StaticMemory(MemoryUsage {
                total_bytes: 100,
                used_bytes: 42,
            })),
            85,
        ))
        .with_check(CpuLoadCheck::new(
            Arc::new(StaticCpu(CpuLoad {
                one_minute: 1.0,
                cores: 4,
            })),
            90,
        ))
        .with_full_check(ContainerCheck::new(Arc::new(StaticContainers(Vec::new()))))
        .with_full_check(DefinitionsCheck::new(
            Arc::new(StaticDefinitions(Some(Duration::from_secs(3600)))),
            7,
        ))
        .with_full_check(UpdatesCheck::new(Arc::new(StaticUpdates(
            PendingUpdates::Counted(0),
        ))))
}

// ─── Overall / aggregation ────────────────────────────────────────────────────

#[tokio::test]
async fn all_ok_system_is_healthy() {
    let report = healthy_runner().run(HealthMode::Full).await;
    assert_eq!(report.issue_count, 0, "report: {report:?}");
    assert_eq!(report.overall, Overall::Healthy);
    assert!(report.is_healthy());
}

#[tokio::test]
async fn issue_counting_maps_to_overall_at_the_boundaries() {
    // one inactive service out of four units: 1 issue → fair
    let one_down = |down: usize| {
        let units: Vec<String> = (0..4).map(|i| format!("svc{i}")).collect();
        let states: Vec<(String, bool)> = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.clone(), i >= down))
            .collect();
        HealthRunner::new().with_check(ServiceCheck::new(units, Arc::new(StaticServices(states))))
    };

    let report = one_down(0).run(HealthMode::Brief).await;
    assert_eq!((report.issue_count, report.overall), (0, Overall::Healthy));

    let report = one_down(1).run(HealthMode::Brief).await;
    assert_eq!((report.issue_count, report.overall), (1, Overall::Fair));

    let report = one_down(3).run(HealthMode::Brief).await;
    assert_eq!((report.issue_count, report.overall), (3, Overall::Fair));

    let report = one_down(4).run(HealthMode::Brief).await;
    assert_eq!((report.issue_count, report.overall), (4, Overall::Poor));
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let runner = healthy_runner();
    let first = runner.run(HealthMode::Full).await;
    let second = runner.run(HealthMode::Full).await;
    assert_eq!(first.results, second.results);
    assert_eq!(first.issue_count, second.issue_count);
    assert_eq!(first.overall, second.overall);
}

#[tokio::test]
async fn brief_mode_skips_full_only_checks() {
    let report = healthy_runner().run(HealthMode::Brief).await;
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"memory"));
    assert!(!names.iter().any(|n| n.starts_with("container")));
    assert!(!names.contains(&"definitions"));
    assert!(!names.contains(&"updates"));
}

// ─── Per-check policies ───────────────────────────────────────────────────────

#[tokio::test]
async fn disk_at_81_percent_warns_with_threshold_80() {
    let check = DiskCheck::new(
        Arc::new(StaticDisks(vec![mount("/data", 100, 81)])),
        80,
        PathBuf::from("/"),
        Vec::new(),
    );
    let results = check.run().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "disk:/data");
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results[0].message.contains("81%"), "{}", results[0].message);
}

#[tokio::test]
async fn boot_mounts_are_excluded() {
    let check = DiskCheck::new(
        Arc::new(StaticDisks(vec![
            mount("/", 100, 10),
            mount("/boot/efi", 100, 99),
        ])),
        80,
        PathBuf::from("/"),
        vec![PathBuf::from("/boot")],
    );
    let results = check.run().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "disk:/");
}

#[tokio::test]
async fn inactive_service_fails_and_each_unit_gets_a_result() {
    let check = ServiceCheck::new(
        vec!["smbd".to_string(), "fail2ban".to_string()],
        Arc::new(StaticServices(vec![
            ("smbd".to_string(), true),
            ("fail2ban".to_string(), false),
        ])),
    );
    let results = check.run().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], CheckResult::ok("service:smbd", "active"));
    assert_eq!(results[1].status, CheckStatus::Fail);
    assert_eq!(results[1].name, "service:fail2ban");
}

#[tokio::test]
async fn failing_service_query_degrades_to_warn() {
    let check = ServiceCheck::new(
        vec!["ghost".to_string()],
        Arc::new(StaticServices(Vec::new())),
    );
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results[0].message.contains("unknown unit"));
}

#[tokio::test]
async fn zero_containers_is_ok() {
    let check = ContainerCheck::new(Arc::new(StaticContainers(Vec::new())));
    let results = check.run().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, CheckStatus::Ok);
    assert!(results[0].message.contains("no containers"));
}

#[tokio::test]
async fn unhealthy_container_fails_and_healthy_ones_pass() {
    let check = ContainerCheck::new(Arc::new(StaticContainers(vec![
        ContainerState {
            name: "grafana".to_string(),
            state: "running".to_string(),
            health: Some("healthy".to_string()),
        },
        ContainerState {
            name: "prometheus".to_string(),
            state: "running".to_string(),
            health: Some("unhealthy".to_string()),
        },
        ContainerState {
            name: "samba".to_string(),
            state: "restarting".to_string(),
            health: None,
        },
    ])));
    let results = check.run().await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, CheckStatus::Ok);
    assert_eq!(results[1].status, CheckStatus::Fail);
    assert_eq!(results[2].status, CheckStatus::Fail);
}

#[tokio::test]
async fn cpu_load_normalizes_by_core_count() {
    // load 3.8 over 4 cores = 95%, above the default 90 threshold
    let check = CpuLoadCheck::new(
        Arc::new(StaticCpu(CpuLoad {
            one_minute: 3.8,
            cores: 4,
        })),
        90,
    );
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);

    // the same absolute load on 8 cores is fine
    let check = CpuLoadCheck::new(
        Arc::new(StaticCpu(CpuLoad {
            one_minute: 3.8,
            cores: 8,
        })),
        90,
    );
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Ok);
}

#[tokio::test]
async fn memory_at_threshold_warns() {
    let check = MemoryCheck::new(
        Arc::new(StaticMemory(MemoryUsage {
            total_bytes: 100,
            used_bytes: 85,
        })),
        85,
    );
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);
}

#[tokio::test]
async fn stale_definitions_warn_and_fresh_ones_pass() {
    let eight_days = Duration::from_secs(8 * 86_400);
    let check = DefinitionsCheck::new(Arc::new(StaticDefinitions(Some(eight_days))), 7);
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results[0].message.contains("8 day"));

    let check = DefinitionsCheck::new(
        Arc::new(StaticDefinitions(Some(Duration::from_secs(3600)))),
        7,
    );
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Ok);
}

#[tokio::test]
async fn missing_definitions_file_warns() {
    let check = DefinitionsCheck::new(Arc::new(StaticDefinitions(None)), 7);
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results[0].message.contains("not found"));
}

#[tokio::test]
async fn missing_update_tool_is_ok_with_message() {
    let check = UpdatesCheck::new(Arc::new(StaticUpdates(PendingUpdates::Unavailable(
        "apt-get not found, skipping update check".to_string(),
    ))));
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Ok);
    assert!(results[0].message.contains("apt-get not found"));
}

#[tokio::test]
async fn pending_updates_warn() {
    let check = UpdatesCheck::new(Arc::new(StaticUpdates(PendingUpdates::Counted(12))));
    let results = check.run().await;
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results[0].message.contains("12"));
}

// ─── Timeout degradation ──────────────────────────────────────────────────────

struct HangingCheck;

#[async_trait]
impl HealthCheck for HangingCheck {
    fn name(&self) -> &'static str {
        "hang"
    }

    async fn run(&self) -> Vec<CheckResult> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        vec![CheckResult::ok("hang", "never reached")]
    }
}

#[tokio::test]
async fn hung_check_degrades_to_timeout_warning() {
    let runner = HealthRunner::new()
        .with_timeout(Duration::from_millis(50))
        .with_check(HangingCheck)
        .with_check(MemoryCheck::new(
            Arc::new(StaticMemory(MemoryUsage {
                total_bytes: 100,
                used_bytes: 10,
            })),
            85,
        ));
    let report = runner.run(HealthMode::Brief).await;

    assert_eq!(report.results.len(), 2, "run continued past the hung check");
    assert_eq!(report.results[0].status, CheckStatus::Warn);
    assert_eq!(report.results[0].message, "check timed out");
    assert_eq!(report.results[1].status, CheckStatus::Ok);
    assert_eq!(report.issue_count, 1);
}
