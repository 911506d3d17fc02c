//! Per-sequence state machine that drives one [`Sequence`] through its states.

use alloc::sync::Arc;
use core::fmt;
use core::time::Duration;

use crate::sequence::Sequence;
use crate::state::{BlockedBy, Side, State, Target, WaitFor};
use crate::subsystems::{SubsystemFault, Subsystems};
use crate::telemetry::TelemetryRecorder;

/// Lifecycle of a [`SequenceRunner`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunStatus {
    /// Queued behind a conflicting runner.
    WaitingToStart,
    Running,
    /// Aborted before it started; applies only its end state once allowed to run.
    WaitingToStartThenAbort,
    /// Finishing the in-flight state before the end state is installed.
    Aborting,
    /// Applying the end state.
    Aborted,
    Finished,
}

impl RunStatus {
    #[must_use]
    pub const fn is_waiting_to_start(self) -> bool {
        matches!(
            self,
            RunStatus::WaitingToStart | RunStatus::WaitingToStartThenAbort
        )
    }

    /// Whether the runner owns its domains right now.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(
            self,
            RunStatus::Running | RunStatus::Aborting | RunStatus::Aborted
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RunStatus::WaitingToStart => "waiting-to-start",
            RunStatus::Running => "running",
            RunStatus::WaitingToStartThenAbort => "waiting-to-start-then-abort",
            RunStatus::Aborting => "aborting",
            RunStatus::Aborted => "aborted",
            RunStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which state of the sequence a runner is applying.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateSlot {
    Step(usize),
    End,
}

impl fmt::Display for StateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateSlot::Step(index) => write!(f, "step {index}"),
            StateSlot::End => f.write_str("end state"),
        }
    }
}

/// Default delay before the first stall is reported.
pub const DEFAULT_INITIAL_LOG_INTERVAL: Duration = Duration::from_millis(250);

/// Tuning for a single runner.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunnerConfig {
    initial_log_interval: Duration,
}

impl RunnerConfig {
    pub const DEFAULT: Self = Self::new(DEFAULT_INITIAL_LOG_INTERVAL);

    #[must_use]
    pub const fn new(initial_log_interval: Duration) -> Self {
        Self {
            initial_log_interval,
        }
    }

    /// Wait before the first stall report; every later report doubles it.
    #[must_use]
    pub const fn initial_log_interval(&self) -> Duration {
        self.initial_log_interval
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Failure that terminates a runner.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunnerFault {
    /// An operation was requested in a status that does not allow it.
    UnexpectedStatus {
        operation: &'static str,
        status: RunStatus,
    },
    /// An active runner had no state to apply.
    NoDesiredState,
    Subsystem(SubsystemFault),
}

impl fmt::Display for RunnerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerFault::UnexpectedStatus { operation, status } => {
                write!(f, "{operation} called in unexpected status {status}")
            }
            RunnerFault::NoDesiredState => f.write_str("no desired state to apply"),
            RunnerFault::Subsystem(fault) => write!(f, "subsystem fault: {fault}"),
        }
    }
}

impl From<SubsystemFault> for RunnerFault {
    fn from(fault: SubsystemFault) -> Self {
        RunnerFault::Subsystem(fault)
    }
}

/// Result of a successful [`SequenceRunner::run`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunProgress {
    /// Call `run` again on a later tick.
    Pending,
    /// Nothing left to apply; the runner can be dropped.
    Finished,
}

/// Drives one sequence: one state at a time, each retried until it converges.
#[derive(Debug)]
pub struct SequenceRunner {
    sequence: Arc<Sequence>,
    status: RunStatus,
    next_step: usize,
    desired: Option<StateSlot>,
    state_started_at: Duration,
    started_at: Option<Duration>,
    next_log_at: Duration,
    log_interval: Duration,
    blocked_by: Option<BlockedBy>,
    first_apply: bool,
    aborted: bool,
    config: RunnerConfig,
}

impl SequenceRunner {
    #[must_use]
    pub fn new(sequence: Arc<Sequence>, config: RunnerConfig) -> Self {
        Self {
            sequence,
            status: RunStatus::WaitingToStart,
            next_step: 0,
            desired: None,
            state_started_at: Duration::ZERO,
            started_at: None,
            next_log_at: Duration::ZERO,
            log_interval: config.initial_log_interval,
            blocked_by: None,
            first_apply: false,
            aborted: false,
            config,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// First unmet condition of the current state, if it is blocked.
    #[must_use]
    pub fn blocked_by(&self) -> Option<BlockedBy> {
        self.blocked_by
    }

    #[must_use]
    pub fn desired_slot(&self) -> Option<StateSlot> {
        self.desired
    }

    #[must_use]
    pub fn desired_state(&self) -> Option<&State> {
        self.desired.and_then(|slot| self.state_at(slot))
    }

    /// Controller time the current state was installed at.
    #[must_use]
    pub fn state_started_at(&self) -> Duration {
        self.state_started_at
    }

    /// Controller time [`start`](Self::start) was called at.
    #[must_use]
    pub fn started_at(&self) -> Option<Duration> {
        self.started_at
    }

    /// Whether the runner was aborted at any point.
    #[must_use]
    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// Two runners conflict when their sequences share a domain. A runner never
    /// conflicts with itself.
    #[must_use]
    pub fn conflicts_with(&self, other: &SequenceRunner) -> bool {
        !core::ptr::eq(self, other) && self.sequence.conflicts_with(&other.sequence)
    }

    /// Allows the runner to proceed and installs its first state.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerFault::UnexpectedStatus`] unless the runner is waiting to start.
    pub fn start(&mut self, now: Duration) -> Result<(), RunnerFault> {
        self.status = match self.status {
            RunStatus::WaitingToStart => RunStatus::Running,
            RunStatus::WaitingToStartThenAbort => RunStatus::Aborting,
            status => {
                return Err(RunnerFault::UnexpectedStatus {
                    operation: "start",
                    status,
                });
            }
        };
        self.started_at = Some(now);
        self.advance(now);
        Ok(())
    }

    /// Moves past the current state.
    ///
    /// Once every step has been installed the runner finishes, even when it
    /// was aborting: an abort during the last step skips the end state. No-op
    /// while waiting or once finished.
    pub fn advance(&mut self, now: Duration) {
        let exhausted = self.next_step >= self.sequence.states().len();
        match self.status {
            RunStatus::Aborting | RunStatus::Running if exhausted => self.finish(),
            RunStatus::Aborting => {
                self.status = RunStatus::Aborted;
                self.install(StateSlot::End, now);
            }
            RunStatus::Aborted => self.finish(),
            RunStatus::Running => {
                let step = self.next_step;
                self.next_step += 1;
                self.install(StateSlot::Step(step), now);
            }
            RunStatus::WaitingToStart
            | RunStatus::WaitingToStartThenAbort
            | RunStatus::Finished => {}
        }
    }

    /// Requests the end state once the in-flight state converges.
    ///
    /// Returns `true` when the status changed. Aborting twice is a no-op.
    pub fn abort(&mut self) -> bool {
        let next = match self.status {
            RunStatus::WaitingToStart => RunStatus::WaitingToStartThenAbort,
            RunStatus::Running => RunStatus::Aborting,
            _ => return false,
        };
        self.status = next;
        self.aborted = true;
        true
    }

    /// Applies the current state once.
    ///
    /// Returns [`RunProgress::Pending`] while waiting to start or while the
    /// current state (or a later one) still has to be applied.
    ///
    /// # Errors
    ///
    /// A subsystem fault or malformed runner state finishes the runner and is
    /// returned to the caller.
    pub fn run<S, const N: usize>(
        &mut self,
        subsystems: &mut S,
        telemetry: &mut TelemetryRecorder<N>,
        now: Duration,
    ) -> Result<RunProgress, RunnerFault>
    where
        S: Subsystems + ?Sized,
    {
        if self.status.is_waiting_to_start() {
            return Ok(RunProgress::Pending);
        }
        if self.status == RunStatus::Finished {
            return Ok(RunProgress::Finished);
        }

        let applied = self
            .try_apply_state(subsystems, telemetry, now)
            .and_then(|applied| {
                if applied {
                    subsystems.led_strip().set_alliance()?;
                }
                Ok(applied)
            });

        match applied {
            Ok(true) => {
                self.advance(now);
                Ok(self.progress())
            }
            Ok(false) => Ok(RunProgress::Pending),
            Err(fault) => {
                self.finish();
                Err(fault)
            }
        }
    }

    fn progress(&self) -> RunProgress {
        if self.status == RunStatus::Finished {
            RunProgress::Finished
        } else {
            RunProgress::Pending
        }
    }

    fn state_at(&self, slot: StateSlot) -> Option<&State> {
        match slot {
            StateSlot::Step(index) => self.sequence.states().get(index),
            StateSlot::End => Some(self.sequence.end_state()),
        }
    }

    fn install(&mut self, slot: StateSlot, now: Duration) {
        self.desired = Some(slot);
        self.blocked_by = None;
        self.state_started_at = now;
        self.log_interval = self.config.initial_log_interval;
        self.next_log_at = now.saturating_add(self.log_interval);
        self.first_apply = true;
    }

    fn finish(&mut self) {
        self.status = RunStatus::Finished;
        self.desired = None;
        self.blocked_by = None;
    }

    /// Pushes every target, then checks convergence. Returns `true` once the
    /// state has fully applied.
    fn try_apply_state<S, const N: usize>(
        &mut self,
        subsystems: &mut S,
        telemetry: &mut TelemetryRecorder<N>,
        now: Duration,
    ) -> Result<bool, RunnerFault>
    where
        S: Subsystems + ?Sized,
    {
        if !self.status.is_running() {
            return Err(RunnerFault::UnexpectedStatus {
                operation: "apply",
                status: self.status,
            });
        }
        let slot = self.desired.ok_or(RunnerFault::NoDesiredState)?;
        let state = match slot {
            StateSlot::Step(index) => self
                .sequence
                .states()
                .get(index)
                .ok_or(RunnerFault::NoDesiredState)?,
            StateSlot::End => self.sequence.end_state(),
        };

        if self.first_apply {
            self.first_apply = false;
            telemetry.record_state_entered(&self.sequence, slot, state.log_message(), now);
        }

        for target in state.targets() {
            command(subsystems, target)?;
        }

        let Some(cause) = first_unmet(subsystems, state, self.state_started_at, now)? else {
            self.blocked_by = None;
            return Ok(true);
        };

        self.blocked_by = Some(cause);
        subsystems
            .led_strip()
            .set_colour(cause.attention_colour())?;
        if now > self.next_log_at {
            let waited = now.saturating_sub(self.state_started_at);
            telemetry.record_stalled(&self.sequence, slot, cause, waited, now);
            self.log_interval = self.log_interval.saturating_mul(2);
            self.next_log_at = now.saturating_add(self.log_interval);
        }
        Ok(false)
    }
}

fn command<S>(subsystems: &mut S, target: Target) -> Result<(), SubsystemFault>
where
    S: Subsystems + ?Sized,
{
    match target {
        Target::Drive(routine) => subsystems.drivebase().set_drive_routine(routine),
        Target::Pose(pose) => subsystems.location().set_current_pose(pose),
        Target::IntakePosition(position) => subsystems.intake().set_position(position),
        Target::IntakeRps(rps) => subsystems.intake().set_target_rps(rps),
        Target::VelcroDutyCycle(duty) => subsystems.velcro().set_duty_cycle(duty),
        Target::ConveyorDutyCycle(duty) => subsystems.conveyor().set_duty_cycle(duty),
        Target::ShooterRps(rps) => subsystems.shooter().set_target_rps(rps),
        Target::Feeder(side, duty) => subsystems.feeder(side).set_duty_cycle(duty),
        Target::HoodAngle(degrees) => subsystems.shooter().set_hood_angle(degrees),
        Target::LedColour(colour) => subsystems.led_strip().set_colour(colour),
        Target::Climber(side, duty) => subsystems.climber(side).set_duty_cycle(duty),
        Target::Rumble(intensity) => {
            let gamepad = subsystems.gamepad();
            gamepad.set_rumble(Side::Left, intensity)?;
            gamepad.set_rumble(Side::Right, intensity)
        }
    }
}

/// First condition of `state` that does not hold yet, predicates before the timed wait.
fn first_unmet<S>(
    subsystems: &mut S,
    state: &State,
    started_at: Duration,
    now: Duration,
) -> Result<Option<BlockedBy>, SubsystemFault>
where
    S: Subsystems + ?Sized,
{
    for wait in state.waits().iter() {
        let met = match wait {
            WaitFor::IntakePosition => subsystems.intake().is_in_position()?,
            WaitFor::ShooterSpeed => subsystems.shooter().is_at_target_speed()?,
            WaitFor::HoodAngle => subsystems.shooter().is_hood_at_target_angle()?,
            WaitFor::DriveFinished => subsystems.drivebase().has_finished()?,
        };
        if !met {
            return Ok(Some(wait.blocked_by()));
        }
    }

    Ok(match state.timed_wait() {
        Some(wait) if now < wait.ends_at(started_at) => Some(BlockedBy::Time),
        _ => None,
    })
}
