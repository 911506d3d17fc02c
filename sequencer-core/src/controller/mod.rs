//! Multiplexes sequence runners and resolves domain conflicts between them.
//!
//! The controller is single-owner: every method takes `&mut self`, and the
//! host runtime serialises requests from other threads through its request
//! channel. Conflicts are resolved at two points:
//!
//! * [`Controller::run`] aborts every live runner whose sequence shares a
//!   domain with the new one;
//! * [`Controller::tick`] only starts a waiting runner once no other running
//!   runner conflicts with it, so an aborted runner always finishes its
//!   in-flight state and end state before its successor starts.

use alloc::sync::Arc;
use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::runner::{RunProgress, RunStatus, RunnerConfig, SequenceRunner};
use crate::sequence::{Sequence, SequenceId};
use crate::state::BlockedBy;
use crate::subsystems::Subsystems;
use crate::telemetry::{RejectionReason, SequenceOutcome, TelemetryRecorder};

/// Maximum number of live runners (waiting or running).
pub const MAX_RUNNERS: usize = 16;

/// Scheduling period used by the host runtime.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);

/// Controller tuning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    tick_period: Duration,
    start_enabled: bool,
    runner: RunnerConfig,
}

impl ControllerConfig {
    pub const DEFAULT: Self = Self::new(DEFAULT_TICK_PERIOD, false, RunnerConfig::DEFAULT);

    #[must_use]
    pub const fn new(tick_period: Duration, start_enabled: bool, runner: RunnerConfig) -> Self {
        Self {
            tick_period,
            start_enabled,
            runner,
        }
    }

    #[must_use]
    pub const fn with_start_enabled(mut self, start_enabled: bool) -> Self {
        self.start_enabled = start_enabled;
        self
    }

    #[must_use]
    pub const fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    #[must_use]
    pub const fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    #[must_use]
    pub const fn runner(&self) -> RunnerConfig {
        self.runner
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What [`Controller::run`] did with a request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunDisposition {
    /// The controller is disabled; the request was ignored.
    Disabled,
    /// A runner for the same sequence is already live.
    AlreadyActive,
    /// A new runner was queued after aborting `aborted` conflicting runners.
    Queued { aborted: usize },
}

impl fmt::Display for RunDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunDisposition::Disabled => f.write_str("ignored: controller disabled"),
            RunDisposition::AlreadyActive => f.write_str("ignored: already active"),
            RunDisposition::Queued { aborted: 0 } => f.write_str("queued"),
            RunDisposition::Queued { aborted } => write!(f, "queued, aborted {aborted}"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControllerError {
    RunnerTableFull { capacity: usize },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::RunnerTableFull { capacity } => {
                write!(f, "runner table full ({capacity} live runners)")
            }
        }
    }
}

/// Counts of what happened during one [`Controller::tick`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    pub started: usize,
    pub finished: usize,
    pub faulted: usize,
}

/// One line of the diagnostics snapshot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunnerSummary {
    pub id: SequenceId,
    pub name: &'static str,
    pub status: RunStatus,
    pub blocked_by: Option<BlockedBy>,
}

/// Point-in-time view of the controller published for dashboards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControllerDiagnostics {
    pub enabled: bool,
    /// Runners queued behind a conflict.
    pub waiting: usize,
    /// Every runner that has started, in arrival order.
    pub running: Vec<RunnerSummary, MAX_RUNNERS>,
}

impl ControllerDiagnostics {
    /// Distinct blocked-by labels of the running runners, in arrival order.
    pub fn blocked_by(&self) -> impl Iterator<Item = BlockedBy> + '_ {
        self.running
            .iter()
            .enumerate()
            .filter_map(|(index, summary)| {
                let cause = summary.blocked_by?;
                let seen = self.running[..index]
                    .iter()
                    .any(|earlier| earlier.blocked_by == Some(cause));
                (!seen).then_some(cause)
            })
    }
}

impl fmt::Display for ControllerDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("running: ")?;
        if self.running.is_empty() {
            f.write_str("none")?;
        }
        for (position, summary) in self.running.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            f.write_str(summary.name)?;
        }

        f.write_str("\nblocked by: ")?;
        let mut any = false;
        for cause in self.blocked_by() {
            if any {
                f.write_str(", ")?;
            }
            any = true;
            f.write_str(cause.label())?;
        }
        if !any {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Owns every live runner, the enabled flag and the telemetry ring.
pub struct Controller {
    runners: Vec<SequenceRunner, MAX_RUNNERS>,
    enabled: bool,
    config: ControllerConfig,
    telemetry: TelemetryRecorder,
}

impl Controller {
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            runners: Vec::new(),
            enabled: config.start_enabled,
            config,
            telemetry: TelemetryRecorder::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Live runners in arrival order, waiting ones included.
    #[must_use]
    pub fn runners(&self) -> &[SequenceRunner] {
        &self.runners
    }

    /// Runners that have started.
    pub fn running(&self) -> impl Iterator<Item = &SequenceRunner> + '_ {
        self.runners
            .iter()
            .filter(|runner| !runner.status().is_waiting_to_start())
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }

    /// Queues `sequence`, aborting every live runner it conflicts with.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::RunnerTableFull`] when no runner slot is free.
    /// Nothing is aborted in that case.
    pub fn run(
        &mut self,
        sequence: &Arc<Sequence>,
        now: Duration,
    ) -> Result<RunDisposition, ControllerError> {
        if !self.enabled {
            self.telemetry
                .record_rejected(sequence, RejectionReason::Disabled, now);
            return Ok(RunDisposition::Disabled);
        }
        if self
            .runners
            .iter()
            .any(|runner| runner.sequence().id() == sequence.id())
        {
            self.telemetry
                .record_rejected(sequence, RejectionReason::AlreadyActive, now);
            return Ok(RunDisposition::AlreadyActive);
        }
        if self.runners.is_full() {
            self.telemetry
                .record_rejected(sequence, RejectionReason::RunnerTableFull, now);
            return Err(ControllerError::RunnerTableFull {
                capacity: MAX_RUNNERS,
            });
        }

        let mut aborted = 0;
        for runner in &mut self.runners {
            if runner.sequence().conflicts_with(sequence) && runner.abort() {
                aborted += 1;
                self.telemetry
                    .record_aborted(runner.sequence(), Some(sequence), now);
            }
        }

        self.runners
            .push(SequenceRunner::new(Arc::clone(sequence), self.config.runner))
            .map_err(|_| ControllerError::RunnerTableFull {
                capacity: MAX_RUNNERS,
            })?;
        self.telemetry.record_queued(sequence, now);
        Ok(RunDisposition::Queued { aborted })
    }

    /// Resumes accepting run requests.
    pub fn enable(&mut self, now: Duration) {
        if !self.enabled {
            self.enabled = true;
            self.telemetry
                .record_enabled(true, self.runners.len(), now);
        }
    }

    /// Aborts every live runner and stops accepting run requests.
    ///
    /// Returns the number of runners that were newly aborted.
    pub fn disable(&mut self, now: Duration) -> usize {
        let was_enabled = core::mem::replace(&mut self.enabled, false);
        let mut aborted = 0;
        for runner in &mut self.runners {
            if runner.abort() {
                aborted += 1;
                self.telemetry.record_aborted(runner.sequence(), None, now);
            }
        }
        if was_enabled {
            self.telemetry
                .record_enabled(false, self.runners.len(), now);
        }
        aborted
    }

    /// One scheduling period: start what may start, then run every runner once.
    pub fn tick<S>(&mut self, subsystems: &mut S, now: Duration) -> TickReport
    where
        S: Subsystems + ?Sized,
    {
        subsystems.begin_tick(now);
        let mut report = TickReport::default();

        let mut index = 0;
        while index < self.runners.len() {
            if !self.can_start(index) {
                index += 1;
                continue;
            }
            let runner = &mut self.runners[index];
            match runner.start(now) {
                Ok(()) => {
                    self.telemetry.record_started(runner.sequence(), now);
                    report.started += 1;
                    index += 1;
                }
                Err(fault) => {
                    self.telemetry.record_fault(runner.sequence(), fault, now);
                    self.runners.remove(index);
                    report.faulted += 1;
                }
            }
        }

        let mut index = 0;
        while index < self.runners.len() {
            let runner = &mut self.runners[index];
            match runner.run(subsystems, &mut self.telemetry, now) {
                Ok(RunProgress::Pending) => index += 1,
                Ok(RunProgress::Finished) => {
                    let outcome = if runner.was_aborted() {
                        SequenceOutcome::Aborted
                    } else {
                        SequenceOutcome::Completed
                    };
                    self.telemetry.record_finished(
                        runner.sequence(),
                        outcome,
                        runner.started_at(),
                        now,
                    );
                    self.runners.remove(index);
                    report.finished += 1;
                }
                Err(fault) => {
                    self.telemetry.record_fault(runner.sequence(), fault, now);
                    self.runners.remove(index);
                    report.faulted += 1;
                }
            }
        }

        report
    }

    /// A waiting runner may start once no other running runner conflicts with it.
    fn can_start(&self, index: usize) -> bool {
        let candidate = &self.runners[index];
        candidate.status().is_waiting_to_start()
            && !self.runners.iter().enumerate().any(|(other, runner)| {
                other != index && runner.status().is_running() && runner.conflicts_with(candidate)
            })
    }

    #[must_use]
    pub fn diagnostics(&self) -> ControllerDiagnostics {
        let running: Vec<RunnerSummary, MAX_RUNNERS> = self
            .running()
            .map(|runner| RunnerSummary {
                id: runner.sequence().id(),
                name: runner.sequence().name(),
                status: runner.status(),
                blocked_by: runner.blocked_by(),
            })
            .collect();
        ControllerDiagnostics {
            enabled: self.enabled,
            waiting: self.runners.len() - running.len(),
            running,
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerConfig::DEFAULT)
    }
}
