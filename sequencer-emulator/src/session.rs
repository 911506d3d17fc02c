use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use sequencer_core::controller::{Controller, ControllerConfig};
use sequencer_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome, ManualPort};
use sequencer_core::telemetry::EventId;
use sequencer_runtime::ControllerHandle;
use sequencer_runtime::task::log_record;

use crate::catalog::Catalog;
use crate::sim::SimulatedRobot;

enum Console {
    /// Requests go to the runtime thread, which ticks on its own clock.
    Live(CommandExecutor<ControllerHandle<'static>, Catalog>),
    /// The session owns the controller and only ticks on `tick`/`wait`.
    Manual {
        executor: CommandExecutor<ManualPort<SimulatedRobot>, Catalog>,
        logged_through: EventId,
    },
}

pub struct Session {
    console: Console,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
}

impl Session {
    /// Console over a running [`sequencer_runtime`] instance.
    #[must_use]
    pub fn live(handle: ControllerHandle<'static>) -> Self {
        Self::with_console(Console::Live(CommandExecutor::new(handle, Catalog::new())))
    }

    /// Console that owns a controller and a simulated robot, advancing time
    /// only when asked to.
    #[must_use]
    pub fn manual(config: ControllerConfig) -> Self {
        let controller = Controller::new(config);
        let logged_through = controller.telemetry().next_event_id();
        let port = ManualPort::new(controller, SimulatedRobot::new());
        Self::with_console(Console::Manual {
            executor: CommandExecutor::new(port, Catalog::new()),
            logged_through,
        })
    }

    fn with_console(console: Console) -> Self {
        Self {
            console,
            transcript: None,
            started_at: HostInstant::now(),
        }
    }

    /// Mirrors every command and reply into a transcript file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while creating the file.
    pub fn with_transcript(mut self, path: &Path, header: &str) -> io::Result<Self> {
        self.transcript = Some(TranscriptLogger::create(path, header)?);
        Ok(self)
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self.console, Console::Manual { .. })
    }

    /// The simulated robot, when this session owns one.
    #[must_use]
    pub fn robot(&self) -> Option<&SimulatedRobot> {
        match &self.console {
            Console::Live(_) => None,
            Console::Manual { executor, .. } => Some(executor.port().subsystems()),
        }
    }

    /// Controller time in manual mode, wall time since the session began otherwise.
    fn elapsed(&self) -> Duration {
        match &self.console {
            Console::Live(_) => self.started_at.elapsed(),
            Console::Manual { executor, .. } => executor.port().now(),
        }
    }

    /// Executes one console line and returns the reply lines.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the transcript writer.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match &mut self.console {
            Console::Live(executor) => render(executor.execute(trimmed)),
            Console::Manual {
                executor,
                logged_through,
            } => {
                let lines = render(executor.execute(trimmed));
                *logged_through = drain_telemetry(executor.port().controller(), *logged_through);
                lines
            }
        };

        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for reply in &lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, reply)?;
            }
        }
        Ok(lines)
    }

    /// Whether the controller behind this session is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match &self.console {
            Console::Live(executor) => executor.port().diagnostics().enabled,
            Console::Manual { executor, .. } => executor.port().controller().is_enabled(),
        }
    }
}

fn render<E: fmt::Display>(result: Result<CommandOutcome, CommandError<'_, E>>) -> Vec<String> {
    match result {
        Ok(outcome) => outcome.to_string().lines().map(str::to_owned).collect(),
        Err(CommandError::Parse(error)) => vec![format!("ERR syntax {error}")],
        Err(error) => vec![format!("ERR {error}")],
    }
}

/// Logs telemetry recorded since `from`; returns the next id to log.
fn drain_telemetry(controller: &Controller, from: EventId) -> EventId {
    let telemetry = controller.telemetry();
    for record in telemetry.since(from) {
        log_record(record);
    }
    telemetry.next_event_id()
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn create(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# {header}")?;
        writeln!(logger.writer, "# Timestamps are milliseconds since the controller epoch")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::state::IntakePosition;
    use sequencer_core::subsystems::SubsystemId;
    use sequencer_runtime::{RequestQueue, requests::diagnostics_cell};

    fn manual() -> Session {
        Session::manual(ControllerConfig::default())
    }

    fn reply(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("no transcript errors")
    }

    #[test]
    fn runs_are_ignored_until_enabled() {
        let mut session = manual();
        assert!(session.is_manual());
        assert_eq!(
            reply(&mut session, "run set-leds"),
            ["set-leds: ignored: controller disabled"]
        );
        assert_eq!(reply(&mut session, "enable"), ["controller enabled"]);
        assert_eq!(reply(&mut session, "run set-leds"), ["set-leds: queued"]);
        assert!(session.is_enabled());
    }

    #[test]
    fn intaking_waits_for_the_arm() {
        let mut session = manual();
        reply(&mut session, "enable");
        reply(&mut session, "run start-intaking");
        assert_eq!(reply(&mut session, "wait 200ms"), ["t=0.200s"]);

        let status = reply(&mut session, "status");
        assert_eq!(status[0], "controller enabled, 1 running, 0 waiting");
        assert!(
            status[1].contains("start-intaking [running] blocked by intake"),
            "{status:?}"
        );
        assert_eq!(status[2], "blocked by: intake");

        reply(&mut session, "wait 200ms");
        let robot = session.robot().expect("manual session");
        assert_eq!(robot.intake_position(), IntakePosition::Extended);
        assert!((robot.intake_rps() - 90.0).abs() < 1e-9);
        assert_eq!(robot.duty_cycle(SubsystemId::Conveyor), Some(1.0));
    }

    #[test]
    fn shooter_spin_up_finishes_once_converged() {
        let mut session = manual();
        reply(&mut session, "enable");
        reply(&mut session, "run spin-up-shooter");
        reply(&mut session, "wait 1s");

        let status = reply(&mut session, "status");
        assert_eq!(status[0], "controller enabled, 0 running, 0 waiting");
        let robot = session.robot().expect("manual session");
        assert!((robot.shooter_rps() - 60.0).abs() < 1e-9);
        assert!((robot.hood_angle() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn stopping_an_intake_settles_the_conveyor() {
        let mut session = manual();
        reply(&mut session, "enable");
        reply(&mut session, "run start-intaking");
        reply(&mut session, "tick 5");
        assert_eq!(
            reply(&mut session, "run stop-intaking"),
            ["stop-intaking: queued, aborted 1"]
        );
        reply(&mut session, "wait 1s");

        let robot = session.robot().expect("manual session");
        assert_eq!(robot.duty_cycle(SubsystemId::Conveyor), Some(0.3));
        assert!(robot.intake_rps().abs() < 1e-9);
        assert_eq!(
            reply(&mut session, "status")[0],
            "controller enabled, 0 running, 0 waiting"
        );
    }

    #[test]
    fn errors_are_prefixed() {
        let mut session = manual();
        assert_eq!(
            reply(&mut session, "wait 250"),
            ["ERR syntax expected duration, found \"250\" at column 5"]
        );
        assert_eq!(
            reply(&mut session, "run fly"),
            ["ERR unknown sequence `fly` (try `list`)"]
        );
        assert!(reply(&mut session, "   ").is_empty());
    }

    #[test]
    fn live_sessions_cannot_step_time() {
        let queue: &'static RequestQueue = Box::leak(Box::new(RequestQueue::new()));
        let cell = Box::leak(Box::new(diagnostics_cell()));
        let mut session = Session::live(ControllerHandle::new(queue.sender(), cell));

        assert!(!session.is_manual());
        assert!(session.robot().is_none());
        assert_eq!(reply(&mut session, "run set-leds"), ["set-leds: submitted"]);
        assert_eq!(
            reply(&mut session, "tick"),
            ["ERR the live runtime ticks on its own; restart with --manual to step time"]
        );
        assert!(queue.try_receive().is_ok());
    }

    #[test]
    fn transcript_records_both_sides() {
        let path = std::env::temp_dir().join(format!(
            "sequencer-emulator-transcript-{}.log",
            std::process::id()
        ));
        let mut session = manual()
            .with_transcript(&path, "test transcript")
            .expect("transcript file");
        reply(&mut session, "enable");
        reply(&mut session, "wait 30ms");
        drop(session);

        let transcript = fs::read_to_string(&path).expect("read transcript");
        fs::remove_file(&path).expect("remove transcript");
        assert!(transcript.starts_with("# test transcript\n"));
        assert!(transcript.contains("[+     0 ms] HOST> enable"));
        assert!(transcript.contains("[+     0 ms] EMU < controller enabled"));
        assert!(transcript.contains("[+    30 ms] EMU < t=0.030s"));
    }
}
