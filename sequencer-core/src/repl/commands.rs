//! Console command dispatcher.
//!
//! [`CommandExecutor`] turns parsed console lines into controller requests.
//! The controller is reached through a [`ControlPort`], so the same executor
//! drives a live runtime handle or a manually clocked [`ManualPort`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use crate::controller::{Controller, ControllerDiagnostics, ControllerError, RunDisposition};
use crate::sequence::Sequence;
use crate::subsystems::Subsystems;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command};
use super::status::StatusFormatter;

/// Named sequences the console can run.
pub trait SequenceCatalog {
    /// Looks up a sequence by its catalog name.
    fn find(&self, name: &str) -> Option<Arc<Sequence>>;

    /// Every catalog name, in presentation order.
    fn names(&self) -> Vec<&'static str>;
}

/// How far a manual clock should move.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Advance {
    Ticks(u32),
    For(Duration),
}

/// Reply to a run request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunAck {
    /// Handed to a request queue; the controller decides on its next tick.
    Submitted,
    /// Decided synchronously by the controller.
    Disposition(RunDisposition),
}

impl fmt::Display for RunAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunAck::Submitted => f.write_str("submitted"),
            RunAck::Disposition(disposition) => disposition.fmt(f),
        }
    }
}

/// Access to a controller from the console.
pub trait ControlPort {
    type Error: fmt::Display;

    /// Requests that `sequence` runs.
    ///
    /// # Errors
    ///
    /// Returns the port error when the request cannot be delivered.
    fn run(&mut self, sequence: Arc<Sequence>) -> Result<RunAck, Self::Error>;

    /// # Errors
    ///
    /// Returns the port error when the request cannot be delivered.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns the port error when the request cannot be delivered.
    fn disable(&mut self) -> Result<(), Self::Error>;

    fn diagnostics(&self) -> ControllerDiagnostics;

    /// Moves the clock and returns the new controller time.
    ///
    /// # Errors
    ///
    /// Ports driven by a real clock reject manual advancing.
    fn advance(&mut self, advance: Advance) -> Result<Duration, Self::Error>;
}

/// Failure of a [`ManualPort`] request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ManualPortError {
    Controller(ControllerError),
    /// The requested advance would carry the clock past [`Duration::MAX`].
    ClockOverflow,
}

impl From<ControllerError> for ManualPortError {
    fn from(error: ControllerError) -> Self {
        ManualPortError::Controller(error)
    }
}

impl fmt::Display for ManualPortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualPortError::Controller(error) => error.fmt(f),
            ManualPortError::ClockOverflow => f.write_str("manual clock cannot advance that far"),
        }
    }
}

/// Controller and subsystems ticked only when the console says so.
pub struct ManualPort<S> {
    controller: Controller,
    subsystems: S,
    now: Duration,
}

impl<S: Subsystems> ManualPort<S> {
    #[must_use]
    pub fn new(controller: Controller, subsystems: S) -> Self {
        Self {
            controller,
            subsystems,
            now: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[must_use]
    pub fn subsystems(&self) -> &S {
        &self.subsystems
    }

    pub fn subsystems_mut(&mut self) -> &mut S {
        &mut self.subsystems
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    fn tick_to(&mut self, now: Duration) {
        self.now = now;
        self.controller.tick(&mut self.subsystems, now);
    }
}

impl<S: Subsystems> ControlPort for ManualPort<S> {
    type Error = ManualPortError;

    fn run(&mut self, sequence: Arc<Sequence>) -> Result<RunAck, Self::Error> {
        let disposition = self.controller.run(&sequence, self.now)?;
        Ok(RunAck::Disposition(disposition))
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.controller.enable(self.now);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.controller.disable(self.now);
        Ok(())
    }

    fn diagnostics(&self) -> ControllerDiagnostics {
        self.controller.diagnostics()
    }

    /// The whole advance is checked against the clock range before any tick
    /// runs, so a rejected request leaves the clock where it was.
    fn advance(&mut self, advance: Advance) -> Result<Duration, Self::Error> {
        let period = self.controller.config().tick_period();
        let span = match advance {
            Advance::Ticks(count) => period.checked_mul(count),
            Advance::For(duration) => Some(duration),
        };
        let target = span
            .and_then(|span| self.now.checked_add(span))
            .ok_or(ManualPortError::ClockOverflow)?;

        match advance {
            Advance::Ticks(count) => {
                for _ in 0..count {
                    let next = self.now.saturating_add(period);
                    self.tick_to(next);
                }
            }
            Advance::For(_) => {
                if period.is_zero() {
                    self.tick_to(target);
                }
                while self.now < target {
                    let next = self.now.saturating_add(period).min(target);
                    self.tick_to(next);
                }
            }
        }
        Ok(self.now)
    }
}

/// Help requested by the operator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HelpTopic {
    All,
    Command(&'static CommandSpec),
}

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Run { sequence: &'static str, ack: RunAck },
    Enabled,
    Disabled,
    Status(ControllerDiagnostics),
    List(Vec<&'static str>),
    Advanced { now: Duration },
    Help(HelpTopic),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Run { sequence, ack } => write!(f, "{sequence}: {ack}"),
            CommandOutcome::Enabled => f.write_str("controller enabled"),
            CommandOutcome::Disabled => f.write_str("controller disabled"),
            CommandOutcome::Status(diagnostics) => {
                let formatter = StatusFormatter::new(diagnostics);
                formatter.write_summary_line(f)?;
                f.write_str("\n")?;
                formatter.write_runner_lines(f)?;
                formatter.write_blocked_line(f)
            }
            CommandOutcome::List(names) => {
                for (position, name) in names.iter().enumerate() {
                    if position > 0 {
                        f.write_str("\n")?;
                    }
                    f.write_str(name)?;
                }
                Ok(())
            }
            CommandOutcome::Advanced { now } => {
                write!(f, "t={}.{:03}s", now.as_secs(), now.subsec_millis())
            }
            CommandOutcome::Help(HelpTopic::All) => {
                for (position, spec) in catalog::commands().iter().enumerate() {
                    if position > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{:<18}{}", spec.usage, spec.summary)?;
                }
                Ok(())
            }
            CommandOutcome::Help(HelpTopic::Command(spec)) => {
                write!(f, "{}\n  {}", spec.usage, spec.summary)
            }
        }
    }
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError<'a, E> {
    Parse(grammar::ParseError<'a>),
    UnknownSequence(&'a str),
    UnknownTopic(&'a str),
    Port(E),
}

impl<'a, E> From<grammar::ParseError<'a>> for CommandError<'a, E> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::UnknownSequence(name) => {
                write!(f, "unknown sequence `{name}` (try `list`)")
            }
            CommandError::UnknownTopic(name) => write!(f, "no help for `{name}`"),
            CommandError::Port(error) => error.fmt(f),
        }
    }
}

type CommandResult<'a, P> = Result<CommandOutcome, CommandError<'a, <P as ControlPort>::Error>>;

/// Dispatches console commands into a controller port.
pub struct CommandExecutor<P, C> {
    port: P,
    catalog: C,
}

impl<P, C> CommandExecutor<P, C> {
    #[must_use]
    pub const fn new(port: P, catalog: C) -> Self {
        Self { port, catalog }
    }

    #[must_use]
    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    #[must_use]
    pub fn into_inner(self) -> (P, C) {
        (self.port, self.catalog)
    }
}

impl<P, C> CommandExecutor<P, C>
where
    P: ControlPort,
    C: SequenceCatalog,
{
    /// Parses and executes a console line.
    ///
    /// # Errors
    ///
    /// Returns parse errors, unknown catalog names or help topics, and
    /// errors reported by the port.
    pub fn execute<'a>(&mut self, line: &'a str) -> CommandResult<'a, P> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> CommandResult<'a, P> {
        match command {
            Command::Run { sequence } => {
                let found = self
                    .catalog
                    .find(sequence)
                    .ok_or(CommandError::UnknownSequence(sequence))?;
                let name = found.name();
                let ack = self.port.run(found).map_err(CommandError::Port)?;
                Ok(CommandOutcome::Run {
                    sequence: name,
                    ack,
                })
            }
            Command::Enable => {
                self.port.enable().map_err(CommandError::Port)?;
                Ok(CommandOutcome::Enabled)
            }
            Command::Disable => {
                self.port.disable().map_err(CommandError::Port)?;
                Ok(CommandOutcome::Disabled)
            }
            Command::Status => Ok(CommandOutcome::Status(self.port.diagnostics())),
            Command::List => Ok(CommandOutcome::List(self.catalog.names())),
            Command::Tick { count } => self
                .port
                .advance(Advance::Ticks(count))
                .map(|now| CommandOutcome::Advanced { now })
                .map_err(CommandError::Port),
            Command::Wait(duration) => self
                .port
                .advance(Advance::For(duration))
                .map(|now| CommandOutcome::Advanced { now })
                .map_err(CommandError::Port),
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(HelpTopic::All)),
                Some(topic) => catalog::find(topic)
                    .map(|spec| CommandOutcome::Help(HelpTopic::Command(spec)))
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }
}
