//! Container engine cleanup. Thin glue over `docker ... prune`.
//!
//! Only the selector-flag resolution is logic worth testing; the prune
//! invocations themselves belong to the engine.

use std::process::Command;
use tracing::{info, warn};

/// Selector flags from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub containers: bool,
    pub images: bool,
    pub volumes: bool,
    pub networks: bool,
    pub all: bool,
    pub dry_run: bool,
}

/// One prune operation on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneTarget {
    Containers,
    Images,
    Volumes,
    Networks,
}

impl PruneTarget {
    /// Arguments after `docker`.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            PruneTarget::Containers => &["container", "prune", "-f"],
            PruneTarget::Images => &["image", "prune", "-f"],
            PruneTarget::Volumes => &["volume", "prune", "-f"],
            PruneTarget::Networks => &["network", "prune", "-f"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PruneTarget::Containers => "containers",
            PruneTarget::Images => "images",
            PruneTarget::Volumes => "volumes",
            PruneTarget::Networks => "networks",
        }
    }
}

/// Resolve selector flags to an ordered list of prune targets.
///
/// `--all` expands to every target. With no selector at all, only the safe
/// dangling-only set (containers + images) runs; volumes are never touched
/// without an explicit flag.
pub fn resolve_targets(opts: CleanupOptions) -> Vec<PruneTarget> {
    if opts.all {
        return vec![
            PruneTarget::Containers,
            PruneTarget::Images,
            PruneTarget::Volumes,
            PruneTarget::Networks,
        ];
    }
    let mut targets = Vec::new();
    if opts.containers {
        targets.push(PruneTarget::Containers);
    }
    if opts.images {
        targets.push(PruneTarget::Images);
    }
    if opts.volumes {
        targets.push(PruneTarget::Volumes);
    }
    if opts.networks {
        targets.push(PruneTarget::Networks);
    }
    if targets.is_empty() {
        targets = vec![PruneTarget::Containers, PruneTarget::Images];
    }
    targets
}

/// Outcome of one cleanup invocation.
#[derive(Debug)]
pub struct CleanupReport {
    /// Targets that were executed (empty on a dry run).
    pub executed: Vec<PruneTarget>,
    /// Number of prune invocations that failed.
    pub failures: usize,
}

/// Run the resolved prune operations in order.
///
/// A failing prune is reported and counted; later targets still run.
pub fn run_cleanup(opts: CleanupOptions) -> CleanupReport {
    let targets = resolve_targets(opts);

    if opts.dry_run {
        for target in &targets {
            println!("would run: docker {}", target.args().join(" "));
        }
        return CleanupReport {
            executed: Vec::new(),
            failures: 0,
        };
    }

    let mut executed = Vec::new();
    let mut failures = 0usize;
    for target in targets {
        match Command::new("docker").args(target.args()).output() {
            Ok(out) if out.status.success() => {
                info!(target = target.label(), "pruned");
                // docker prints a reclaimed-space summary as the last line
                if let Some(line) = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .last()
                    .filter(|l| !l.is_empty())
                {
                    println!("{}: {line}", target.label());
                }
                executed.push(target);
            }
            Ok(out) => {
                warn!(target = target.label(), "prune failed");
                eprintln!(
                    "cleanup of {} failed: {}",
                    target.label(),
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                executed.push(target);
                failures += 1;
            }
            Err(e) => {
                warn!(target = target.label(), error = %e, "docker unavailable");
                eprintln!("cleanup of {} failed: docker unavailable: {e}", target.label());
                failures += 1;
            }
        }
    }

    CleanupReport { executed, failures }
}
