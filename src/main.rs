use anyhow::Result;
use clap::{Parser, Subcommand};
use opsbox::backup::rotator::run_backup;
use opsbox::cleanup::{self, CleanupOptions};
use opsbox::config::OpsConfig;
use opsbox::health::report::print_report;
use opsbox::health::runner::{HealthMode, HealthRunner};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "opsbox",
    about = "Server health checks, config backup rotation, and container cleanup",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the opsbox config file (TOML). Defaults apply when absent.
    #[arg(long, env = "OPSBOX_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OPSBOX_LOG", default_value = "warn", global = true)]
    log: String,

    /// Suppress informational output.
    ///
    /// Errors are still printed to stderr. JSON output (--json) is
    /// unaffected. Use this flag when piping output to other tools.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run system health checks.
    ///
    /// Checks service status, disk usage, memory, and CPU load; with --full
    /// also container health, security-definition freshness, and pending
    /// package updates.
    ///
    /// Exit code 0 if every check is OK, 1 if any check reported an issue.
    ///
    /// Examples:
    ///   opsbox health
    ///   opsbox health --full
    ///   opsbox health --full --json
    Health {
        /// Also run container, definition-freshness, and update checks
        #[arg(long)]
        full: bool,
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Back up configured paths into one checksummed archive.
    ///
    /// Stages every present manifest source, writes a timestamped
    /// config-backup-<YYYYMMDD_HHMMSS>.tar.gz plus a .sha256 sidecar into
    /// the destination, then deletes archives older than the retention
    /// window. Reading protected paths usually requires root; unreadable
    /// sources are skipped, not fatal.
    ///
    /// Exit code 0 unless the destination is unwritable, another run holds
    /// the destination lock, or the archive step fails.
    ///
    /// Examples:
    ///   sudo opsbox backup
    ///   sudo opsbox backup /mnt/backups
    Backup {
        /// Destination directory (default: from config)
        dest: Option<std::path::PathBuf>,
    },
    /// Prune unused container-engine resources.
    ///
    /// Pure glue over `docker ... prune -f`. With no selector, only the
    /// safe dangling-only set (containers + images) is pruned.
    ///
    /// Examples:
    ///   opsbox cleanup
    ///   opsbox cleanup --all --dry-run
    ///   opsbox cleanup --volumes --networks
    Cleanup {
        /// Prune stopped containers
        #[arg(long)]
        containers: bool,
        /// Prune dangling images
        #[arg(long)]
        images: bool,
        /// Prune unused volumes
        #[arg(long)]
        volumes: bool,
        /// Prune unused networks
        #[arg(long)]
        networks: bool,
        /// Prune everything above
        #[arg(long)]
        all: bool,
        /// Print the prune commands without running them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log);

    let config = OpsConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Health { full, json } => {
            let runner = HealthRunner::from_config(&config.health);
            let mode = if full { HealthMode::Full } else { HealthMode::Brief };
            let report = runner.run(mode).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            std::process::exit(if report.is_healthy() { 0 } else { 1 });
        }
        Command::Backup { dest } => {
            let destination = dest.unwrap_or_else(|| config.backup.destination.clone());
            match run_backup(&config.backup.manifest, &destination, config.backup.retention_days) {
                Ok(outcome) => {
                    for skip in &outcome.skipped {
                        warn!(source = %skip.source.display(), reason = %skip.reason, "skipped");
                    }
                    if !args.quiet {
                        println!(
                            "wrote {} ({} bytes, sha256 {})",
                            outcome.archive_path.display(),
                            outcome.size_bytes,
                            outcome.checksum
                        );
                        println!(
                            "staged {} entr(ies), skipped {}, pruned {} old archive(s)",
                            outcome.staged,
                            outcome.skipped.len(),
                            outcome.pruned.len()
                        );
                    }
                }
                Err(e) => {
                    eprintln!("backup failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Cleanup {
            containers,
            images,
            volumes,
            networks,
            all,
            dry_run,
        } => {
            let report = cleanup::run_cleanup(CleanupOptions {
                containers,
                images,
                volumes,
                networks,
                all,
                dry_run,
            });
            if report.failures > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber. Command output stays on stdout;
/// diagnostics go through tracing at the requested level.
fn setup_logging(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
