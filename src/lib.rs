pub mod backup;
pub mod cleanup;
pub mod config;
pub mod health;

// Re-export the types the CLI touches so main.rs stays thin.
pub use backup::rotator::{run_backup, BackupError, BackupOutcome};
pub use config::OpsConfig;
pub use health::report::{HealthReport, Overall};
pub use health::runner::{HealthMode, HealthRunner};
