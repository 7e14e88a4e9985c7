// SPDX-License-Identifier: MIT
//! System health checks.
//!
//! [`HealthRunner`] runs an ordered registry of [`checks::HealthCheck`]
//! implementations and aggregates their results into a
//! [`report::HealthReport`].
//!
//! # Included checks
//! - service status, one result per configured unit
//! - disk usage, one result per checked mount
//! - memory usage, cpu load
//! - container health, security-definition freshness, pending updates
//!   (full mode only)
//!
//! # Usage
//! ```rust,no_run
//! use opsbox::config::HealthConfig;
//! use opsbox::health::runner::{HealthMode, HealthRunner};
//!
//! # async fn demo() {
//! let runner = HealthRunner::from_config(&HealthConfig::default());
//! let report = runner.run(HealthMode::Brief).await;
//! println!("overall: {}", report.overall);
//! # }
//! ```

pub mod checks;
pub mod report;
pub mod runner;
pub mod sources;
pub mod system;

// Convenience re-exports.
pub use checks::HealthCheck;
pub use report::{CheckResult, CheckStatus, HealthReport, Overall};
pub use runner::{HealthMode, HealthRunner};
