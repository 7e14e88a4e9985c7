// SPDX-License-Identifier: MIT
//! Backup rotation: stage configured paths, produce one checksummed archive,
//! prune archives past the retention window.
//!
//! Failure policy: a missing or unreadable source is recorded as a skip and
//! the run continues. The run fails only when the destination cannot be
//! prepared, another run holds the destination lock, or the archive/checksum
//! step itself fails. A partial archive is never left on disk without its
//! checksum file.

use chrono::Local;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use super::manifest::ManifestEntry;

/// Archives are named `config-backup-<YYYYMMDD_HHMMSS>.tar.gz`.
pub const ARCHIVE_PREFIX: &str = "config-backup-";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
/// Checksum sidecars append this to the full archive name.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

const LOCK_FILE_NAME: &str = ".opsbox-backup.lock";
const SECS_PER_DAY: u64 = 86_400;

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Fatal backup failures. Everything else is a recorded skip.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("cannot prepare destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("another backup is already running against {0}")]
    DestinationBusy(PathBuf),
    #[error("cannot create staging tree: {0}")]
    Staging(#[source] io::Error),
    #[error("archive step failed for {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot persist checksum for {path}: {source}")]
    Checksum {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

/// A manifest entry that was not staged, and why.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkippedEntry {
    pub source: PathBuf,
    pub reason: String,
}

/// Everything one backup run produced.
#[derive(Debug, serde::Serialize)]
pub struct BackupOutcome {
    pub archive_path: PathBuf,
    pub checksum_path: PathBuf,
    /// Hex SHA-256 digest of the finished archive file.
    pub checksum: String,
    pub size_bytes: u64,
    /// ISO-8601 timestamp the archive name is derived from.
    pub created_at: String,
    /// Number of manifest entries staged into the archive.
    pub staged: usize,
    pub skipped: Vec<SkippedEntry>,
    /// Expired archives deleted by this run.
    pub pruned: Vec<PathBuf>,
    /// Where the staging tree lived during the run. Gone once the run ends.
    pub staging_path: PathBuf,
}

// ─── Destination lock ─────────────────────────────────────────────────────────

/// Advisory lock serializing backup runs per destination directory.
///
/// Retention deletion races between two concurrent runs against the same
/// destination; holding this lock for the whole run prevents that.
pub struct DestinationLock {
    path: PathBuf,
    inner: fd_lock::RwLock<File>,
}

impl DestinationLock {
    pub fn new(destination: &Path) -> Result<Self, BackupError> {
        let lock_path = destination.join(LOCK_FILE_NAME);
        let file = File::options()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| BackupError::Destination {
                path: destination.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            path: destination.to_path_buf(),
            inner: fd_lock::RwLock::new(file),
        })
    }

    /// Take the lock without blocking; fails fast when another run holds it.
    pub fn try_acquire(&mut self) -> Result<fd_lock::RwLockWriteGuard<'_, File>, BackupError> {
        self.inner.try_write().map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                BackupError::DestinationBusy(self.path.clone())
            } else {
                BackupError::Destination {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })
    }
}

// ─── Backup run ───────────────────────────────────────────────────────────────

/// Stage the manifest, write one archive + checksum pair into `destination`,
/// and prune archives older than `retention_days`.
pub fn run_backup(
    manifest: &[ManifestEntry],
    destination: &Path,
    retention_days: u64,
) -> Result<BackupOutcome, BackupError> {
    fs::create_dir_all(destination).map_err(|e| BackupError::Destination {
        path: destination.to_path_buf(),
        source: e,
    })?;
    let mut lock = DestinationLock::new(destination)?;
    let guard = lock.try_acquire()?;
    let outcome = run_locked(manifest, destination, retention_days);
    drop(guard);
    outcome
}

fn run_locked(
    manifest: &[ManifestEntry],
    destination: &Path,
    retention_days: u64,
) -> Result<BackupOutcome, BackupError> {
    let staging = tempfile::Builder::new()
        .prefix("opsbox-staging-")
        .tempdir()
        .map_err(BackupError::Staging)?;
    let staging_path = staging.path().to_path_buf();

    let mut staged = 0usize;
    let mut skipped: Vec<SkippedEntry> = Vec::new();
    for entry in manifest {
        match stage_entry(entry, staging.path()) {
            Ok(true) => {
                debug!(source = %entry.source.display(), "staged");
                staged += 1;
            }
            Ok(false) => {
                debug!(source = %entry.source.display(), "source missing, skipping");
                skipped.push(SkippedEntry {
                    source: entry.source.clone(),
                    reason: "not present on this host".to_string(),
                });
            }
            Err(e) => {
                warn!(source = %entry.source.display(), error = %e, "failed to stage, skipping");
                skipped.push(SkippedEntry {
                    source: entry.source.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let created_at = Local::now();
    let archive_name = format!(
        "{ARCHIVE_PREFIX}{}{ARCHIVE_SUFFIX}",
        created_at.format("%Y%m%d_%H%M%S")
    );
    let archive_path = destination.join(&archive_name);
    build_archive(staging.path(), &archive_path)?;

    // The checksum covers the finished archive file on disk, not the stream
    // that produced it.
    let checksum = match file_sha256(&archive_path) {
        Ok(digest) => digest,
        Err(e) => {
            let _ = fs::remove_file(&archive_path);
            return Err(BackupError::Checksum {
                path: archive_path,
                source: e,
            });
        }
    };
    let checksum_path = destination.join(format!("{archive_name}{CHECKSUM_SUFFIX}"));
    // sha256sum-compatible line, so `sha256sum -c` can verify the archive.
    if let Err(e) = fs::write(&checksum_path, format!("{checksum}  {archive_name}\n")) {
        let _ = fs::remove_file(&archive_path);
        return Err(BackupError::Checksum {
            path: checksum_path,
            source: e,
        });
    }
    let size_bytes = fs::metadata(&archive_path)
        .map(|m| m.len())
        .map_err(|e| BackupError::Archive {
            path: archive_path.clone(),
            source: e,
        })?;

    let pruned = match expired_archives(destination, retention_days, SystemTime::now()) {
        Ok(mut old) => {
            old.retain(|p| p != &archive_path);
            delete_archives(&old)
        }
        Err(e) => {
            warn!(error = %e, "retention scan failed, skipping prune");
            Vec::new()
        }
    };

    // Staging data must never leak into subsequent runs.
    if let Err(e) = staging.close() {
        warn!(error = %e, "failed to remove staging tree");
    }

    info!(
        archive = %archive_path.display(),
        size_bytes,
        staged,
        skipped = skipped.len(),
        pruned = pruned.len(),
        "backup complete"
    );

    Ok(BackupOutcome {
        archive_path,
        checksum_path,
        checksum,
        size_bytes,
        created_at: created_at.to_rfc3339(),
        staged,
        skipped,
        pruned,
        staging_path,
    })
}

// ─── Staging ──────────────────────────────────────────────────────────────────

/// Copy one manifest entry into the staging tree.
///
/// Returns `Ok(false)` when the source does not exist. Any other error is
/// returned to the caller, which records the entry as skipped.
fn stage_entry(entry: &ManifestEntry, staging_root: &Path) -> io::Result<bool> {
    let meta = match fs::metadata(&entry.source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let rel = sanitize_archive_path(&entry.archive_path)?;
    let dest = staging_root.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let copied = if meta.is_dir() {
        copy_dir_recursive(&entry.source, &dest)
    } else {
        fs::copy(&entry.source, &dest).map(|_| ())
    };
    if let Err(e) = copied {
        // A half-copied entry must not end up in the archive.
        if meta.is_dir() {
            let _ = fs::remove_dir_all(&dest);
        } else {
            let _ = fs::remove_file(&dest);
        }
        return Err(e);
    }
    Ok(true)
}

/// Normalize an archive-relative path, rejecting anything that would land
/// outside the staging tree.
fn sanitize_archive_path(raw: &str) -> io::Result<PathBuf> {
    let mut clean = PathBuf::new();
    for comp in Path::new(raw).components() {
        match comp {
            Component::Normal(c) => clean.push(c),
            Component::CurDir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("archive path escapes the staging tree: {raw}"),
                ));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty archive path",
        ));
    }
    Ok(clean)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    let mut entries = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let ty = entry.file_type()?;
        let to = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_recursive(&entry.path(), &to)?;
        } else if ty.is_file() {
            fs::copy(entry.path(), &to)?;
        } else {
            debug!(path = %entry.path().display(), "skipping special file");
        }
    }
    Ok(())
}

// ─── Archive + checksum ───────────────────────────────────────────────────────

/// Build a gzipped tar of the staging tree at `archive_path`.
///
/// Entries are the staged archive-relative paths, in sorted order. On any
/// failure the partial file is removed before the error is returned.
fn build_archive(staging: &Path, archive_path: &Path) -> Result<(), BackupError> {
    let write = || -> io::Result<()> {
        let file = File::create(archive_path)?;
        let enc = flate2::write::GzEncoder::new(
            io::BufWriter::new(file),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(enc);

        let mut entries = fs::read_dir(staging)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = PathBuf::from(entry.file_name());
            if entry.file_type()?.is_dir() {
                builder.append_dir_all(&name, entry.path())?;
            } else {
                builder.append_path_with_name(entry.path(), &name)?;
            }
        }

        let enc = builder.into_inner()?;
        let mut out = enc.finish()?;
        out.flush()?;
        Ok(())
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(archive_path);
        return Err(BackupError::Archive {
            path: archive_path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

/// Hex SHA-256 digest of a file's contents, streamed.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

// ─── Retention ────────────────────────────────────────────────────────────────

/// Does `name` match the archive naming pattern?
pub fn is_archive_name(name: &str) -> bool {
    name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_SUFFIX)
}

/// Path of the checksum sidecar belonging to `archive`.
pub fn checksum_path_for(archive: &Path) -> PathBuf {
    let mut os = archive.as_os_str().to_os_string();
    os.push(CHECKSUM_SUFFIX);
    PathBuf::from(os)
}

/// List archives in `destination` whose modification time is older than the
/// retention window, sorted by path. Age comes from the file mtime, never
/// from the timestamp embedded in the name.
pub fn expired_archives(
    destination: &Path,
    retention_days: u64,
    now: SystemTime,
) -> io::Result<Vec<PathBuf>> {
    let window = Duration::from_secs(retention_days * SECS_PER_DAY);
    let mut expired = Vec::new();
    for entry in fs::read_dir(destination)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_archive_name(name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        let age = now.duration_since(modified).unwrap_or_default();
        if age > window {
            expired.push(entry.path());
        }
    }
    expired.sort();
    Ok(expired)
}

/// Delete `archives` and their checksum sidecars as pairs.
///
/// A file already removed by a concurrent run is tolerated; other failures
/// are logged and leave the pair in place for the next run.
pub fn delete_archives(archives: &[PathBuf]) -> Vec<PathBuf> {
    let mut deleted = Vec::new();
    for path in archives {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(archive = %path.display(), "pruned expired archive");
                deleted.push(path.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(archive = %path.display(), "already removed");
            }
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "failed to prune archive");
                continue;
            }
        }
        let sidecar = checksum_path_for(path);
        match fs::remove_file(&sidecar) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(checksum = %sidecar.display(), error = %e, "failed to prune checksum"),
        }
    }
    deleted
}
