// SPDX-License-Identifier: MIT
//! Report types produced by a health run.
//!
//! A [`HealthReport`] is constructed fresh per invocation and never persisted.
//! `issue_count` and `overall` are derived from the results at construction
//! time; results keep their registration order so two runs against unchanged
//! system state render identically.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Verdict of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The property is within policy.
    Ok,
    /// The property breaches a threshold or could not be queried.
    Warn,
    /// The property is in a hard failure state (service down, container unhealthy).
    Fail,
}

impl CheckStatus {
    /// Returns `true` for [`CheckStatus::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, CheckStatus::Ok)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "ok"),
            CheckStatus::Warn => write!(f, "warn"),
            CheckStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Result of one evaluated check. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Identifier of the checked property (e.g. `"disk:/var"`, `"service:smbd"`).
    pub name: String,
    /// Verdict against the configured policy.
    pub status: CheckStatus,
    /// Human-readable detail (e.g. `"82% full"`).
    pub message: String,
}

impl CheckResult {
    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            message: message.into(),
        }
    }

    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            message: message.into(),
        }
    }
}

/// Overall verdict derived from the number of non-OK results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overall {
    Healthy,
    Fair,
    Poor,
}

impl Overall {
    /// 0 issues → healthy, 1–3 → fair, more → poor.
    pub fn from_issue_count(issues: usize) -> Self {
        match issues {
            0 => Overall::Healthy,
            1..=3 => Overall::Fair,
            _ => Overall::Poor,
        }
    }
}

impl std::fmt::Display for Overall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Overall::Healthy => write!(f, "healthy"),
            Overall::Fair => write!(f, "fair"),
            Overall::Poor => write!(f, "poor"),
        }
    }
}

/// Aggregate of all check results for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Individual results, in check registration order.
    pub results: Vec<CheckResult>,
    /// Number of results whose status is not OK.
    pub issue_count: usize,
    /// Overall verdict derived from `issue_count`.
    pub overall: Overall,
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// opsbox version string.
    pub version: String,
}

impl HealthReport {
    /// Build a report from ordered results, deriving the aggregate fields.
    pub fn new(results: Vec<CheckResult>) -> Self {
        let issue_count = results.iter().filter(|r| !r.status.is_ok()).count();
        Self {
            overall: Overall::from_issue_count(issue_count),
            issue_count,
            results,
            generated_at: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Returns `true` if no check reported an issue.
    pub fn is_healthy(&self) -> bool {
        self.issue_count == 0
    }
}

// ─── Console output ───────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a formatted table of check results to stdout.
pub fn print_report(report: &HealthReport) {
    println!();
    println!("{BOLD}opsbox health{RESET}");
    println!("{}", "─".repeat(60));

    for r in &report.results {
        let (symbol, color) = match r.status {
            CheckStatus::Ok => ("✓", GREEN),
            CheckStatus::Warn => ("!", YELLOW),
            CheckStatus::Fail => ("✗", RED),
        };
        println!("  {color}{symbol}{RESET}  {:<24}  {}", r.name, r.message);
    }

    println!("{}", "─".repeat(60));

    let color = match report.overall {
        Overall::Healthy => GREEN,
        Overall::Fair => YELLOW,
        Overall::Poor => RED,
    };
    println!(
        "{color}overall: {}{RESET} ({} issue(s) across {} check(s))",
        report.overall,
        report.issue_count,
        report.results.len()
    );
    println!();
}
