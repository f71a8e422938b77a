//! REPL – Read-Eval-Print Loop for the pathscan interactive shell.
//!
//! Supported slash-commands:
//!   /load <file>  – feed a scan file to the detector
//!   /path         – show the latest ordered sequence
//!   /reference    – show the current reference scene
//!   /config       – show the active configuration
//!   /save         – write the active configuration to `~/.pathscan/config.toml`
//!   /help         – show this list
//!   /quit | /exit – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pathscan_middleware::SequenceReceiver;
use pathscan_perception::ReferenceUpdate;
use pathscan_runtime::SequenceDetector;
use pathscan_types::PointSet;

use crate::config::{self, Config};
use crate::scan_file;

/// Points listed by `/path` before the rest is summarised.
const PATH_PREVIEW: usize = 20;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    Load(&'a str),
    Path,
    Reference,
    Config,
    Save,
    Help,
    Quit,
    Missing(&'static str),
    Unknown(&'a str),
}

/// Parse one trimmed, non-empty input line.
pub fn parse_command(line: &str) -> Command<'_> {
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "/load" if rest.is_empty() => Command::Missing("/load <file>"),
        "/load" => Command::Load(rest),
        "/path" => Command::Path,
        "/reference" => Command::Reference,
        "/config" => Command::Config,
        "/save" => Command::Save,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line),
    }
}

/// Interactive session state.
pub struct Session {
    config: Config,
    detector: SequenceDetector,
    published: SequenceReceiver,
}

impl Session {
    pub fn new(config: Config, detector: SequenceDetector, published: SequenceReceiver) -> Self {
        Self {
            config,
            detector,
            published,
        }
    }

    fn load(&mut self, file: &str) {
        let scan = match scan_file::read_scan(Path::new(file), &self.config.frame_id) {
            Ok(scan) => scan,
            Err(e) => {
                println!("{}: {}", "Load failed".red(), e);
                return;
            }
        };
        let points = scan.len();
        let outcome = self.detector.process_scan(scan);

        let verdict = match outcome.update {
            ReferenceUpdate::Initialized => "reference initialized".green(),
            ReferenceUpdate::Replaced { changed_points } => {
                format!(
                    "significant change ({changed_points} point(s) in new voxels), reference replaced"
                )
                .yellow()
            }
            ReferenceUpdate::Kept => "no significant change, reference kept".dimmed(),
        };
        println!(
            "  Scan #{} with {} point(s): {}",
            self.detector.scans_processed(),
            points,
            verdict
        );

        let mut delivered = 0;
        while let Some(seq) = self.published.try_recv() {
            delivered += 1;
            println!("  {} ordered sequence of {} point(s) published", "✓".green(), seq.len());
        }
        if delivered == 0 {
            println!("  {}", "sequence was not delivered".red());
        }
    }

    fn show_path(&self) {
        let seq = self.detector.snapshot().latest();
        if seq.is_empty() {
            println!("  {}", "No ordered sequence yet. Use /load <file>.".dimmed());
            return;
        }
        println!("{}", "Ordered Sequence".bold().underline());
        print_points(&seq);
    }

    fn show_reference(&self) {
        let reference = self.detector.reference();
        println!("{}", "Reference Scene".bold().underline());
        if !reference.is_initialized() {
            println!("  {}", "not initialized".dimmed());
            return;
        }
        let current = reference.current();
        println!("  Points   : {}", current.len().to_string().yellow());
        println!("  Frame    : {}", current.header.frame_id.yellow());
        println!("  Stamp    : {}", current.header.stamp.to_rfc3339().yellow());
        println!("  Scans    : {}", self.detector.scans_processed());
    }

    fn show_config(&self) {
        println!("{}", "Configuration".bold().underline());
        match toml::to_string_pretty(&self.config) {
            Ok(raw) => {
                for line in raw.lines() {
                    println!("  {line}");
                }
            }
            Err(e) => println!("{}: {}", "Cannot render config".red(), e),
        }
    }

    fn save_config(&self) {
        match config::save(&self.config) {
            Ok(()) => println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut session: Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "pathscan>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match parse_command(cmd) {
            Command::Load(file) => session.load(file),
            Command::Path => session.show_path(),
            Command::Reference => session.show_reference(),
            Command::Config => session.show_config(),
            Command::Save => session.save_config(),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Missing(usage) => {
                println!("{} {}", "Usage:".red(), usage.bold());
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "pathscan Commands".bold().underline());
    println!("  {} – feed a scan file to the detector", "/load <file>".bold().cyan());
    println!("  {}        – show the latest ordered sequence", "/path".bold().cyan());
    println!("  {}   – show the current reference scene", "/reference".bold().cyan());
    println!("  {}      – show the active configuration", "/config".bold().cyan());
    println!("  {}        – save the configuration", "/save".bold().cyan());
    println!("  {} – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn print_points(seq: &PointSet) {
    for (i, p) in seq.points.iter().take(PATH_PREVIEW).enumerate() {
        println!(
            "  {:>5}  ({:>9.3}, {:>9.3}, {:>9.3})  r={}",
            i,
            p.x,
            p.y,
            p.z,
            p.color.r.to_string().dimmed()
        );
    }
    if seq.len() > PATH_PREVIEW {
        println!("  {} more point(s) …", (seq.len() - PATH_PREVIEW).to_string().dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathscan_middleware::SequenceBus;

    fn session() -> Session {
        let config = Config::default();
        let bus = Arc::new(SequenceBus::default());
        let published = bus.subscribe();
        let detector = SequenceDetector::new(config.detector.clone(), bus).expect("valid config");
        Session::new(config, detector, published)
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("/path"), Command::Path);
        assert_eq!(parse_command("/reference"), Command::Reference);
        assert_eq!(parse_command("/config"), Command::Config);
        assert_eq!(parse_command("/save"), Command::Save);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn load_takes_the_rest_of_the_line() {
        assert_eq!(parse_command("/load scans/a b.xyz"), Command::Load("scans/a b.xyz"));
        assert_eq!(parse_command("/load"), Command::Missing("/load <file>"));
        assert_eq!(parse_command("/load   "), Command::Missing("/load <file>"));
    }

    #[test]
    fn unknown_commands_are_reported_verbatim() {
        assert_eq!(parse_command("/teleport now"), Command::Unknown("/teleport now"));
        assert_eq!(parse_command("hello"), Command::Unknown("hello"));
    }

    #[test]
    fn load_feeds_the_detector() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("scan.xyz");
        std::fs::write(&path, "0 0 0\n1 0 0\n2 0 0\n").expect("write");

        let mut s = session();
        s.load(&path.to_string_lossy());

        assert_eq!(s.detector.scans_processed(), 1);
        assert!(s.detector.reference().is_initialized());
        assert_eq!(s.detector.snapshot().latest().len(), 3);
    }

    #[test]
    fn failed_load_leaves_detector_untouched() {
        let mut s = session();
        s.load("/definitely/not/here.xyz");
        assert_eq!(s.detector.scans_processed(), 0);
        assert!(!s.detector.reference().is_initialized());
    }
}
