//! cmdlog - line console for a key/value command backend
//!
//! cmdlog keeps a running transcript of submitted commands and their
//! responses, remembers the active command and pattern, and keeps a
//! searchable command history.
//!
//! # Quick Start
//!
//! ```text
//! cmdlog                     # Start with ~/.cmdlog/config.toml
//! cmdlog -c ./console.toml   # Use another config file
//! cmdlog --no-history        # Do not read or record history
//! ```
//!
//! # Console commands
//!
//! | Input | Action |
//! |-------|--------|
//! | any text | Run it against the backend |
//! | :clear | Clear the output |
//! | :patterns | List patterns |
//! | :pattern ID | Select a pattern |
//! | :history [QUERY] | List matching history |
//! | :pick N | Put history entry N into the input |
//! | :quit | Exit |

mod config;
mod core;
mod demo;
mod error;
mod history;
mod ui;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::transport::Transport;
use crate::core::{CatalogSlot, ChannelTransport, Pattern, SessionController, TranscriptView};
use crate::demo::MemoryBackend;
use crate::error::ConsoleError;
use crate::history::{CommandHistory, Suggestions};
use crate::ui::Renderer;

/// How long a submit waits for the first response before prompting again
const RESPONSE_WAIT: Duration = Duration::from_millis(500);

/// Number of history suggestions listed at once
const MAX_SUGGESTIONS: usize = 20;

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    /// Explicit config file
    config_path: Option<PathBuf>,
    /// Disable history regardless of config
    no_history: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("cmdlog {}", VERSION);
}

fn print_help() {
    eprintln!("cmdlog {} - line console for a key/value command backend", VERSION);
    eprintln!();
    eprintln!("Usage: cmdlog [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Config file (default: ~/.cmdlog/config.toml)");
    eprintln!("      --no-history      Do not read or record command history");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Console commands:");
    eprintln!("  <command>             Run a command (e.g. SET key value)");
    eprintln!("  :clear                Clear the output");
    eprintln!("  :patterns             List patterns");
    eprintln!("  :pattern <id>         Select a pattern");
    eprintln!("  :history [query]      List history, newest first");
    eprintln!("  :pick <n>             Put history entry n into the input");
    eprintln!("  <empty line>          Run the picked entry");
    eprintln!("  :quit                 Exit");
    eprintln!();
    eprintln!("Logging: ~/.cmdlog/cmdlog.log (filter with CMDLOG_LOG)");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                options.config_path = Some(PathBuf::from(&args[i]));
            }
            "--no-history" => {
                options.no_history = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// One line typed at the prompt
#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Submit(String),
    /// Blank line: runs the picked entry, if any
    Empty,
    Clear,
    Patterns,
    Pattern(String),
    History(String),
    Pick(usize),
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(directive) = trimmed.strip_prefix(':') else {
        return ConsoleInput::Submit(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, rest) = directive
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((directive, ""));
    match (name, rest) {
        ("clear", "") => ConsoleInput::Clear,
        ("patterns", "") => ConsoleInput::Patterns,
        ("pattern", id) if !id.is_empty() => ConsoleInput::Pattern(id.to_string()),
        ("history", query) => ConsoleInput::History(query.to_string()),
        ("pick", n) => match n.parse() {
            Ok(n) => ConsoleInput::Pick(n),
            Err(_) => ConsoleInput::Unknown(trimmed.to_string()),
        },
        ("quit", "") | ("q", "") => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(trimmed.to_string()),
    }
}

/// Log to ~/.cmdlog/cmdlog.log
fn init_logging(level: &str) {
    let log_path = config::data_dir()
        .map(|dir| dir.join("cmdlog.log"))
        .unwrap_or_else(|| PathBuf::from("cmdlog.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("CMDLOG_LOG").unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // An explicit config path must load; the default one may fall back
    let (config, fallback) = match &options.config_path {
        Some(path) => (Config::load_from(path)?, None),
        None => Config::load(),
    };

    init_logging(&config.log.level);
    info!("cmdlog {} starting", VERSION);
    report_config_fallback(fallback);

    run_console(config, &options)?;

    info!("cmdlog exiting");
    Ok(())
}

/// Log why the default config was not used. Needs the subscriber installed.
fn report_config_fallback(fallback: Option<ConsoleError>) {
    if let Some(e) = fallback {
        warn!("{}; using defaults", e);
    }
}

/// Run the interactive console until `:quit` or end of input
fn run_console(config: Config, options: &Options) -> anyhow::Result<()> {
    let (transport, responses) = ChannelTransport::spawn(MemoryBackend::new());
    let command_slot = CatalogSlot::<String>::new();
    let pattern_slot = CatalogSlot::<Pattern>::new();

    let mut session = SessionController::new(
        transport,
        responses,
        Box::new(command_slot.clone()),
        Box::new(pattern_slot.clone()),
    )
    .with_uppercase_echo(config.echo.uppercase);

    if config.history.enabled && !options.no_history {
        match CommandHistory::default_path() {
            Some(path) => {
                session = session.with_history(CommandHistory::open(path, config.history.limit));
            }
            None => warn!("no home directory; history disabled"),
        }
    }

    let mut view = session.subscribe();
    let mut renderer = Renderer::new();
    let mut suggestions = Suggestions::new(MAX_SUGGESTIONS);
    let mut input_epoch = session.input_epoch();
    let mut stdout = io::stdout();
    let mut lines = io::stdin().lock().lines();

    loop {
        session.process_responses();
        render_changes(&mut renderer, &mut view, &mut stdout)?;
        reset_input_on_submit(&session, &mut input_epoch, &mut suggestions);
        renderer.prompt(
            &mut stdout,
            session.active_command(),
            session.active_pattern(),
            session.pending_input(),
        )?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match parse_input(&line) {
            ConsoleInput::Submit(command) => {
                session.run_command(&command);
                render_changes(&mut renderer, &mut view, &mut stdout)?;
                session.wait_for_responses(RESPONSE_WAIT);
            }
            ConsoleInput::Empty => {
                if let Some(pending) = session.pending_input().map(str::to_string) {
                    session.run_command(&pending);
                    render_changes(&mut renderer, &mut view, &mut stdout)?;
                    session.wait_for_responses(RESPONSE_WAIT);
                }
            }
            ConsoleInput::Clear => session.clear_output(),
            ConsoleInput::Patterns => {
                let active = pattern_slot.get();
                for pattern in &config.patterns {
                    let marker = if active.as_ref() == Some(pattern) { '*' } else { ' ' };
                    writeln!(stdout, "{} {:<10} {}", marker, pattern.id, pattern.template)?;
                }
            }
            ConsoleInput::Pattern(id) => match config.find_pattern(&id) {
                Some(pattern) => session.select_pattern(pattern.clone()),
                None => writeln!(stdout, "no pattern '{}'", id)?,
            },
            ConsoleInput::History(query) => match session.history() {
                Some(history) => {
                    suggestions.update(history, &query);
                    if suggestions.is_empty() {
                        writeln!(stdout, "(no history)")?;
                    }
                    for (num, command) in suggestions.items() {
                        writeln!(stdout, "{:>3}  {}", num, command)?;
                    }
                }
                None => writeln!(stdout, "history is disabled")?,
            },
            ConsoleInput::Pick(num) => match suggestions.pick(num).map(str::to_string) {
                Some(command) => session.write_command(&command),
                None => writeln!(stdout, "no suggestion {}; run :history first", num)?,
            },
            ConsoleInput::Quit => break,
            ConsoleInput::Unknown(input) => {
                writeln!(stdout, "unknown console command '{}'", input)?;
            }
        }
    }

    info!("last active command: {:?}", command_slot.get());
    session.teardown();
    Ok(())
}

/// Drop the suggestion list once a command has been submitted since
/// `seen_epoch`. Returns whether the input was reset.
fn reset_input_on_submit<T: Transport>(
    session: &SessionController<T>,
    seen_epoch: &mut u64,
    suggestions: &mut Suggestions,
) -> bool {
    let epoch = session.input_epoch();
    if epoch == *seen_epoch {
        return false;
    }
    *seen_epoch = epoch;
    suggestions.clear();
    true
}

/// Print whatever the transcript gained since the last call
fn render_changes<W: Write>(
    renderer: &mut Renderer,
    view: &mut TranscriptView,
    out: &mut W,
) -> io::Result<()> {
    if view.has_changed().unwrap_or(false) {
        let transcript = view.borrow_and_update().clone();
        renderer.render(out, &transcript)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("cmdlog")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Options::default());

        let options = parse_args(&args(&["--config", "a.toml", "--no-history"])).unwrap();
        assert_eq!(options.config_path, Some(PathBuf::from("a.toml")));
        assert!(options.no_history);

        assert!(parse_args(&args(&["-c"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("get  foo "), ConsoleInput::Submit("get  foo ".into()));
        assert_eq!(parse_input("   "), ConsoleInput::Empty);
        assert_eq!(parse_input(":clear"), ConsoleInput::Clear);
        assert_eq!(parse_input(":pattern get"), ConsoleInput::Pattern("get".into()));
        assert_eq!(parse_input(":history"), ConsoleInput::History(String::new()));
        assert_eq!(parse_input(":history  lpush x"), ConsoleInput::History("lpush x".into()));
        assert_eq!(parse_input(":pick 3"), ConsoleInput::Pick(3));
        assert_eq!(parse_input(":pick x"), ConsoleInput::Unknown(":pick x".into()));
        assert_eq!(parse_input(":q"), ConsoleInput::Quit);
        assert_eq!(parse_input(":pattern"), ConsoleInput::Unknown(":pattern".into()));
    }

    #[test]
    fn test_console_round_trip_against_memory_backend() {
        let (transport, responses) = ChannelTransport::spawn(MemoryBackend::new());
        let mut session = SessionController::new(
            transport,
            responses,
            Box::new(CatalogSlot::<String>::new()),
            Box::new(CatalogSlot::<Pattern>::new()),
        );
        let mut view = session.subscribe();
        let mut renderer = Renderer::new();
        let mut out = Vec::new();

        session.run_command("lpush x 1");
        let mut applied = 0;
        for _ in 0..50 {
            applied += session.wait_for_responses(Duration::from_millis(100));
            if applied > 0 {
                break;
            }
        }
        assert_eq!(applied, 1);
        render_changes(&mut renderer, &mut view, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("LPUSH X 1"));
        assert!(text.contains("(integer) 1"));
        assert_eq!(session.active_command(), Some("lpush"));
    }

    #[test]
    fn test_submit_resets_input_state() {
        let (transport, responses) = ChannelTransport::spawn(MemoryBackend::new());
        let mut session = SessionController::new(
            transport,
            responses,
            Box::new(CatalogSlot::<String>::new()),
            Box::new(CatalogSlot::<Pattern>::new()),
        )
        .with_history(CommandHistory::in_memory(10));
        let mut suggestions = Suggestions::new(MAX_SUGGESTIONS);
        let mut epoch = session.input_epoch();
        let renderer = Renderer::new();

        session.run_command("set a 1");
        assert!(reset_input_on_submit(&session, &mut epoch, &mut suggestions));

        suggestions.update(session.history().unwrap(), "");
        let picked = suggestions.pick(1).unwrap().to_string();
        session.write_command(&picked);
        assert!(!reset_input_on_submit(&session, &mut epoch, &mut suggestions));
        assert!(!suggestions.is_empty());

        let mut before = Vec::new();
        renderer
            .prompt(&mut before, session.active_command(), None, session.pending_input())
            .unwrap();
        assert!(String::from_utf8(before).unwrap().contains("(picked: set a 1)"));

        session.run_command(&picked);
        assert!(reset_input_on_submit(&session, &mut epoch, &mut suggestions));
        assert!(suggestions.is_empty());
        assert_eq!(suggestions.pick(1), None);

        let mut after = Vec::new();
        renderer
            .prompt(&mut after, session.active_command(), None, session.pending_input())
            .unwrap();
        let after = String::from_utf8(after).unwrap();
        assert!(!after.contains("picked"));
        assert!(after.contains("[set]"));
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_config_fallback_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "echo = [").unwrap();
        let (config, fallback) = Config::load_or_default(&path);
        assert_eq!(config, Config::default());

        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = FmtSubscriber::builder()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || report_config_fallback(fallback));

        let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("WARN"));
        assert!(logged.contains("using defaults"));
    }
}
