mod catalog;
mod session;
mod sim;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use sequencer_core::controller::ControllerConfig;
use sequencer_runtime::RuntimeConfig;
use session::Session;
use sim::SimulatedRobot;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "Usage: sequencer-emulator [--enabled] [--tick-ms <n>] [--manual] [--transcript <path>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    enabled: bool,
    tick_ms: Option<u64>,
    manual: bool,
    transcript: Option<PathBuf>,
}

impl Options {
    fn controller_config(&self) -> ControllerConfig {
        let config = ControllerConfig::DEFAULT.with_start_enabled(self.enabled);
        match self.tick_ms {
            Some(ms) => config.with_tick_period(Duration::from_millis(ms)),
            None => config,
        }
    }
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });
    init_tracing();

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = open_session(&options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Sequencer emulator ready ({} clock, controller {}). Type `help` for commands or `exit` to quit.",
        if session.is_manual() { "manual" } else { "live" },
        if session.is_enabled() { "enabled" } else { "disabled" },
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

/// Logs go to stderr so they do not interleave with console replies on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn open_session(options: &Options) -> io::Result<Session> {
    let config = options.controller_config();
    let session = if options.manual {
        Session::manual(config)
    } else {
        let handle = sequencer_runtime::start(
            RuntimeConfig::new(config),
            Box::new(SimulatedRobot::new()),
        )
        .map_err(io::Error::other)?;
        Session::live(handle)
    };

    match &options.transcript {
        Some(path) => session.with_transcript(path, "Sequencer emulator transcript"),
        None => Ok(session),
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--enabled" => options.enabled = true,
            "--manual" => options.manual = true,
            "--tick-ms" => {
                let value = args.next().ok_or("Expected value after --tick-ms")?;
                options.tick_ms = Some(parse_tick_ms(&value)?);
            }
            "--transcript" => {
                let value = args.next().ok_or("Expected path after --transcript")?;
                options.transcript = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--tick-ms=") {
                    options.tick_ms = Some(parse_tick_ms(value)?);
                } else if let Some(value) = other.strip_prefix("--transcript=") {
                    options.transcript = Some(PathBuf::from(value));
                } else {
                    return Err(format!("Unknown argument `{other}`"));
                }
            }
        }
    }
    Ok(options)
}

fn parse_tick_ms(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(format!("Invalid tick period `{value}` (expected milliseconds > 0)")),
    }
}
