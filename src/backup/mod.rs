// SPDX-License-Identifier: MIT
//! Configuration backup with rotation.
//!
//! [`rotator::run_backup`] stages the manifest into a temporary tree,
//! produces one compressed, checksummed, timestamp-named archive in the
//! destination directory, and prunes archives older than the retention
//! window. Runs against the same destination are serialized with an
//! advisory lock.

pub mod manifest;
pub mod rotator;

// Convenience re-exports.
pub use manifest::{default_manifest, ManifestEntry};
pub use rotator::{run_backup, BackupError, BackupOutcome, DestinationLock};
