//! `pathscan-cli` – pathscan Command Line Interface
//!
//! This binary drives the sequence detector from scan files.  It:
//!
//! 1. Installs logging through `pathscan_runtime::telemetry` (stderr, with
//!    optional OTLP export).
//! 2. Loads `~/.pathscan/config.toml` plus `PATHSCAN_*` overrides and
//!    validates the detector settings; an invalid configuration exits
//!    non-zero before any scan is read.
//! 3. `pathscan run <scan>...` feeds the scans in order through a
//!    [`ScanService`] and prints the final ordered sequence as JSON.
//! 4. `pathscan` with no arguments drops into an **interactive REPL**.
//! 5. Intercepts **Ctrl-C** to stop between scans and exit cleanly.

mod config;
mod repl;
mod scan_file;

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use pathscan_middleware::SequenceBus;
use pathscan_runtime::{ScanService, SequenceDetector};
use pathscan_types::{PointSet, ScanError};

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // Logs go to stderr; stdout is reserved for sequences and the REPL.
    let _guard = pathscan_runtime::init_tracing("pathscan");

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping after the current scan …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available"
        );
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.detector.validate() {
        eprintln!("{}: {}", "Invalid configuration".red(), e);
        return ExitCode::from(2);
    }

    // ── Dispatch ──────────────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_interactive(cfg, shutdown),
        Some("run") if args.len() > 1 => {
            let files: Vec<PathBuf> = args[1..].iter().map(PathBuf::from).collect();
            match run_batch(&cfg, &files, &shutdown) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    ExitCode::FAILURE
                }
            }
        }
        Some("help" | "--help" | "-h") => {
            print_usage();
            ExitCode::SUCCESS
        }
        Some(_) => {
            print_usage();
            ExitCode::from(2)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

fn run_interactive(cfg: config::Config, shutdown: Arc<AtomicBool>) -> ExitCode {
    print_banner();

    let bus = Arc::new(SequenceBus::new(cfg.detector.publish_capacity.max(1)));
    let published = bus.subscribe();
    let detector = match SequenceDetector::new(cfg.detector.clone(), bus) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red(), e);
            return ExitCode::from(2);
        }
    };

    println!(
        "  Axis {}  ·  K = {}  ·  voxel {}",
        cfg.detector.axis.to_string().bold(),
        cfg.detector.cluster_size.to_string().bold(),
        cfg.detector.voxel_resolution.to_string().bold()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(repl::Session::new(cfg, detector, published), shutdown);
    ExitCode::SUCCESS
}

/// Feed `files` in order through a [`ScanService`] and print the final
/// ordered sequence as JSON on stdout.
fn run_batch(
    cfg: &config::Config,
    files: &[PathBuf],
    shutdown: &AtomicBool,
) -> Result<(), ScanError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Io(format!("failed to start runtime: {e}")))?;

    let last = runtime.block_on(async {
        let bus = Arc::new(SequenceBus::new(cfg.detector.publish_capacity.max(1)));
        let mut published = bus.subscribe();
        let detector = SequenceDetector::new(cfg.detector.clone(), bus)?;
        let handle = ScanService::spawn(detector);

        for file in files {
            if shutdown.load(Ordering::SeqCst) {
                warn!("shutdown requested; remaining scans skipped");
                break;
            }
            handle.submit(scan_file::read_scan(file, &cfg.frame_id)?).await?;
        }

        let detector = handle.shutdown().await?;
        let mut sequences = 0usize;
        while published.try_recv().is_some() {
            sequences += 1;
        }
        info!(scans = detector.scans_processed(), sequences, "batch finished");
        Ok::<PointSet, ScanError>(detector.snapshot().latest().as_ref().clone())
    })?;

    let json = serde_json::to_string_pretty(&last)
        .map_err(|e| ScanError::Parse(format!("failed to encode sequence: {e}")))?;
    println!("{json}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "   ┌─┐┌─┐┌┬┐┬ ┬┌─┐┌─┐┌─┐┌┐┌".bold().cyan());
    println!("{}", "   ├─┘├─┤ │ ├─┤└─┐│  ├─┤│││".bold().cyan());
    println!("{}", "   ┴  ┴ ┴ ┴ ┴ ┴└─┘└─┘┴ ┴┘└┘".bold().cyan());
    println!("{}", "   ordered point sequences from depth scans".dimmed());
    println!();
}

fn print_usage() {
    println!("{}", "Usage".bold().underline());
    println!("  {}               – interactive shell", "pathscan".bold().cyan());
    println!(
        "  {} – process scans in order, print the last sequence as JSON",
        "pathscan run <scan>...".bold().cyan()
    );
    println!();
    println!(
        "  Scans are {} point sets or text files with `x y z [r g b]` per line.",
        "*.json".bold()
    );
    println!("  Settings live in {}.", config::config_path().display().to_string().bold());
}
