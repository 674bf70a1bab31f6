//! Purpose: `coordlink` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `coordlink::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod config_json;

use command_dispatch::dispatch_command;
use config_json::{config_json, config_summary_json};
use coordlink::notice::{Notice, notice_json};
use coordlink::{Error, ErrorKind, LinkConfig, LinkOverrides, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome { exit_code });
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `coordlink --help`."));
            }
        },
    };

    init_tracing();

    let Cli {
        config,
        coordinator,
        service,
        connect_timeout_ms,
        command,
    } = cli;
    let base = match config {
        Some(path) => LinkConfig::load(&path)?,
        None => LinkConfig::default(),
    };
    let link_config = base.apply(LinkOverrides {
        coordinator,
        service,
        connect_timeout_ms,
    });

    dispatch_command(command, link_config).map_err(add_coordinator_hint)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "coordlink",
    version,
    about = "Follow and query a cluster coordination service",
    long_about = None,
    after_help = r#"EXAMPLES
  $ coordlink --coordinator 127.0.0.1:1982 show
  $ coordlink --coordinator 127.0.0.1:1982 watch --count 3
  $ coordlink --config link.json rpc stats --data '{"verbose":true}'

NOTES
  - --config reads JSON: {"coordinator": "HOST:PORT", "service": "...", "connect_timeout_ms": 5000}
  - Flags override values from --config
  - RUST_LOG controls diagnostics on stderr (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, help = "Link config file (JSON)", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long, help = "Coordinator address as HOST:PORT")]
    coordinator: Option<String>,
    #[arg(long, help = "Coordinator service name (default: coordinator)")]
    service: Option<String>,
    #[arg(long, help = "Connect timeout in milliseconds (default: 5000)")]
    connect_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Print the current cluster configuration",
        long_about = r#"Wait for the first configuration from the coordinator and print it as JSON."#
    )]
    Show {
        #[arg(long, help = "Give up after this many milliseconds")]
        timeout_ms: Option<u64>,
    },
    #[command(
        about = "Print one line per new configuration version",
        after_help = r#"NOTES
  - Malformed or older configurations are reported on stderr and skipped
  - Ctrl-C ends the watch with exit code 0"#
    )]
    Watch {
        #[arg(long, help = "Exit after this many versions")]
        count: Option<u64>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Call a coordinator function and print its output"
    )]
    Rpc {
        #[arg(help = "Function name")]
        function: String,
        #[arg(long, help = "Input as UTF-8 text", conflicts_with = "data_hex")]
        data: Option<String>,
        #[arg(long = "data-hex", help = "Input as hex bytes")]
        data_hex: Option<String>,
    },
    #[command(about = "Print version info")]
    Version,
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_line(value: Value) {
    let json = serde_json::to_string(&value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("coordlink {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "coordlink",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice) {
    if io::stderr().is_terminal() {
        eprintln!("notice: {} (coordinator: {})", notice.message, notice.coordinator);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::CoordFail => "coordinator unavailable".to_string(),
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::BadConfig => "bad configuration".to_string(),
        ErrorKind::PollFailed => "poll failed".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(request_id) = err.request_id() {
        inner.insert("request_id".to_string(), json!(request_id));
    }
    if let Some(version) = err.version() {
        inner.insert("version".to_string(), json!(version));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(request_id) = err.request_id() {
        lines.push(format!("request: {request_id}"));
    }
    if let Some(version) = err.version() {
        lines.push(format!("version: {version}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn add_coordinator_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::CoordFail || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that the coordinator is running and reachable at --coordinator.")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn parse_hex(text: &str) -> Result<Vec<u8>, Error> {
    let bad = || {
        Error::new(ErrorKind::Usage)
            .with_message("invalid --data-hex value")
            .with_hint("Use an even number of hex digits, e.g. --data-hex 0a1b.")
    };
    let digits = text.trim();
    if digits.len() % 2 != 0 {
        return Err(bad());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(bad)
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn install_stop_flag() -> Result<Arc<AtomicBool>, Error> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to install signal handler")
                .with_source(err)
        })?;
    }
    Ok(stop)
}

fn stop_requested(stop: &AtomicBool) -> bool {
    stop.load(Ordering::Relaxed)
}

const WATCH_SLICE: Duration = Duration::from_millis(250);
