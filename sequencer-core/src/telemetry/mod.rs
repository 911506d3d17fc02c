//! Telemetry event catalog and the ring buffer the controller records into.
//!
//! The core never logs. Every lifecycle transition of every runner is
//! recorded here instead, with compact numeric event codes so records can be
//! shipped over a diagnostics channel, and the host runtime drains the ring
//! into structured logs after each tick.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::runner::{RunnerFault, StateSlot};
use crate::sequence::{Sequence, SequenceId};
use crate::state::BlockedBy;

/// Identifier assigned to every telemetry record.
pub type EventId = u64;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    SequenceQueued,
    SequenceRejected,
    SequenceAborted,
    SequenceStarted,
    StateEntered,
    StateStalled,
    SequenceFinished,
    RunnerFaulted,
    ControllerEnabled,
    ControllerDisabled,
    Custom(u16),
}

impl TelemetryEventKind {
    const SEQUENCE_QUEUED_CODE: u16 = 0x0001;
    const SEQUENCE_REJECTED_CODE: u16 = 0x0002;
    const SEQUENCE_ABORTED_CODE: u16 = 0x0003;
    const SEQUENCE_STARTED_CODE: u16 = 0x0004;
    const STATE_ENTERED_CODE: u16 = 0x0010;
    const STATE_STALLED_CODE: u16 = 0x0011;
    const SEQUENCE_FINISHED_CODE: u16 = 0x0020;
    const RUNNER_FAULTED_CODE: u16 = 0x0021;
    const CONTROLLER_ENABLED_CODE: u16 = 0x0030;
    const CONTROLLER_DISABLED_CODE: u16 = 0x0031;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::SequenceQueued => Self::SEQUENCE_QUEUED_CODE,
            TelemetryEventKind::SequenceRejected => Self::SEQUENCE_REJECTED_CODE,
            TelemetryEventKind::SequenceAborted => Self::SEQUENCE_ABORTED_CODE,
            TelemetryEventKind::SequenceStarted => Self::SEQUENCE_STARTED_CODE,
            TelemetryEventKind::StateEntered => Self::STATE_ENTERED_CODE,
            TelemetryEventKind::StateStalled => Self::STATE_STALLED_CODE,
            TelemetryEventKind::SequenceFinished => Self::SEQUENCE_FINISHED_CODE,
            TelemetryEventKind::RunnerFaulted => Self::RUNNER_FAULTED_CODE,
            TelemetryEventKind::ControllerEnabled => Self::CONTROLLER_ENABLED_CODE,
            TelemetryEventKind::ControllerDisabled => Self::CONTROLLER_DISABLED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::SEQUENCE_QUEUED_CODE => TelemetryEventKind::SequenceQueued,
            Self::SEQUENCE_REJECTED_CODE => TelemetryEventKind::SequenceRejected,
            Self::SEQUENCE_ABORTED_CODE => TelemetryEventKind::SequenceAborted,
            Self::SEQUENCE_STARTED_CODE => TelemetryEventKind::SequenceStarted,
            Self::STATE_ENTERED_CODE => TelemetryEventKind::StateEntered,
            Self::STATE_STALLED_CODE => TelemetryEventKind::StateStalled,
            Self::SEQUENCE_FINISHED_CODE => TelemetryEventKind::SequenceFinished,
            Self::RUNNER_FAULTED_CODE => TelemetryEventKind::RunnerFaulted,
            Self::CONTROLLER_ENABLED_CODE => TelemetryEventKind::ControllerEnabled,
            Self::CONTROLLER_DISABLED_CODE => TelemetryEventKind::ControllerDisabled,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::SequenceQueued => f.write_str("sequence-queued"),
            TelemetryEventKind::SequenceRejected => f.write_str("sequence-rejected"),
            TelemetryEventKind::SequenceAborted => f.write_str("sequence-aborted"),
            TelemetryEventKind::SequenceStarted => f.write_str("sequence-started"),
            TelemetryEventKind::StateEntered => f.write_str("state-entered"),
            TelemetryEventKind::StateStalled => f.write_str("state-stalled"),
            TelemetryEventKind::SequenceFinished => f.write_str("sequence-finished"),
            TelemetryEventKind::RunnerFaulted => f.write_str("runner-faulted"),
            TelemetryEventKind::ControllerEnabled => f.write_str("controller-enabled"),
            TelemetryEventKind::ControllerDisabled => f.write_str("controller-disabled"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Identity of the sequence a record refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceTelemetry {
    pub id: SequenceId,
    pub name: &'static str,
}

impl SequenceTelemetry {
    #[must_use]
    pub fn of(sequence: &Sequence) -> Self {
        Self {
            id: sequence.id(),
            name: sequence.name(),
        }
    }
}

/// Why a run request was not queued.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RejectionReason {
    Disabled,
    AlreadyActive,
    RunnerTableFull,
}

impl RejectionReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RejectionReason::Disabled => "controller disabled",
            RejectionReason::AlreadyActive => "already active",
            RejectionReason::RunnerTableFull => "runner table full",
        }
    }
}

/// How a finished sequence ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceOutcome {
    Completed,
    Aborted,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AbortTelemetry {
    pub sequence: SequenceTelemetry,
    /// Sequence whose arrival forced the abort; `None` when the controller was disabled.
    pub aborted_by: Option<SequenceTelemetry>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateTelemetry {
    pub sequence: SequenceTelemetry,
    pub slot: StateSlot,
    pub log: Option<&'static str>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StallTelemetry {
    pub sequence: SequenceTelemetry,
    pub slot: StateSlot,
    pub blocked_by: BlockedBy,
    pub waited: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FinishTelemetry {
    pub sequence: SequenceTelemetry,
    pub outcome: SequenceOutcome,
    pub duration: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FaultTelemetry {
    pub sequence: SequenceTelemetry,
    pub fault: RunnerFault,
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryPayload {
    None,
    Sequence(SequenceTelemetry),
    Rejection {
        sequence: SequenceTelemetry,
        reason: RejectionReason,
    },
    Abort(AbortTelemetry),
    State(StateTelemetry),
    Stall(StallTelemetry),
    Finish(FinishTelemetry),
    Fault(FaultTelemetry),
    Controller {
        live_runners: u8,
    },
}

impl TelemetryPayload {
    /// Sequence the payload refers to, when it refers to one.
    #[must_use]
    pub fn sequence(&self) -> Option<SequenceTelemetry> {
        match self {
            TelemetryPayload::Sequence(sequence)
            | TelemetryPayload::Rejection { sequence, .. }
            | TelemetryPayload::Abort(AbortTelemetry { sequence, .. })
            | TelemetryPayload::State(StateTelemetry { sequence, .. })
            | TelemetryPayload::Stall(StallTelemetry { sequence, .. })
            | TelemetryPayload::Finish(FinishTelemetry { sequence, .. })
            | TelemetryPayload::Fault(FaultTelemetry { sequence, .. }) => Some(*sequence),
            TelemetryPayload::None | TelemetryPayload::Controller { .. } => None,
        }
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Sequence(sequence) => f.write_str(sequence.name),
            TelemetryPayload::Rejection { sequence, reason } => {
                write!(f, "{} ({})", sequence.name, reason.label())
            }
            TelemetryPayload::Abort(abort) => match abort.aborted_by {
                Some(by) => write!(f, "{} by {}", abort.sequence.name, by.name),
                None => f.write_str(abort.sequence.name),
            },
            TelemetryPayload::State(state) => {
                write!(f, "{} {}", state.sequence.name, state.slot)?;
                if let Some(log) = state.log {
                    write!(f, ": {log}")?;
                }
                Ok(())
            }
            TelemetryPayload::Stall(stall) => write!(
                f,
                "{} {} blocked by {} for {}ms",
                stall.sequence.name,
                stall.slot,
                stall.blocked_by,
                stall.waited.as_millis()
            ),
            TelemetryPayload::Finish(finish) => {
                let outcome = match finish.outcome {
                    SequenceOutcome::Completed => "completed",
                    SequenceOutcome::Aborted => "aborted",
                };
                write!(f, "{} {outcome}", finish.sequence.name)?;
                if let Some(duration) = finish.duration {
                    write!(f, " after {}ms", duration.as_millis())?;
                }
                Ok(())
            }
            TelemetryPayload::Fault(fault) => {
                write!(f, "{}: {}", fault.sequence.name, fault.fault)
            }
            TelemetryPayload::Controller { live_runners } => {
                write!(f, "{live_runners} live runners")
            }
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Controller time the event was recorded at.
    pub timestamp: Duration,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>4}.{:03}s] {} {}",
            self.timestamp.as_secs(),
            self.timestamp.subsec_millis(),
            self.event,
            self.details
        )
    }
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Records with an id of at least `first`, oldest first.
    ///
    /// Pass the previous [`next_event_id`](Self::next_event_id) to drain only
    /// what was recorded since.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.oldest_first().filter(move |record| record.id >= first)
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Id the next recorded event will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: Duration,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        });

        id
    }

    pub fn record_queued(&mut self, sequence: &Sequence, timestamp: Duration) -> EventId {
        self.record(
            TelemetryEventKind::SequenceQueued,
            TelemetryPayload::Sequence(SequenceTelemetry::of(sequence)),
            timestamp,
        )
    }

    pub fn record_rejected(
        &mut self,
        sequence: &Sequence,
        reason: RejectionReason,
        timestamp: Duration,
    ) -> EventId {
        self.record(
            TelemetryEventKind::SequenceRejected,
            TelemetryPayload::Rejection {
                sequence: SequenceTelemetry::of(sequence),
                reason,
            },
            timestamp,
        )
    }

    pub fn record_aborted(
        &mut self,
        sequence: &Sequence,
        aborted_by: Option<&Sequence>,
        timestamp: Duration,
    ) -> EventId {
        self.record(
            TelemetryEventKind::SequenceAborted,
            TelemetryPayload::Abort(AbortTelemetry {
                sequence: SequenceTelemetry::of(sequence),
                aborted_by: aborted_by.map(SequenceTelemetry::of),
            }),
            timestamp,
        )
    }

    pub fn record_started(&mut self, sequence: &Sequence, timestamp: Duration) -> EventId {
        self.record(
            TelemetryEventKind::SequenceStarted,
            TelemetryPayload::Sequence(SequenceTelemetry::of(sequence)),
            timestamp,
        )
    }

    pub fn record_state_entered(
        &mut self,
        sequence: &Sequence,
        slot: StateSlot,
        log: Option<&'static str>,
        timestamp: Duration,
    ) -> EventId {
        self.record(
            TelemetryEventKind::StateEntered,
            TelemetryPayload::State(StateTelemetry {
                sequence: SequenceTelemetry::of(sequence),
                slot,
                log,
            }),
            timestamp,
        )
    }

    pub fn record_stalled(
        &mut self,
        sequence: &Sequence,
        slot: StateSlot,
        blocked_by: BlockedBy,
        waited: Duration,
        timestamp: Duration,
    ) -> EventId {
        self.record(
            TelemetryEventKind::StateStalled,
            TelemetryPayload::Stall(StallTelemetry {
                sequence: SequenceTelemetry::of(sequence),
                slot,
                blocked_by,
                waited,
            }),
            timestamp,
        )
    }

    /// Records a finished sequence, with its run time when the start is known.
    pub fn record_finished(
        &mut self,
        sequence: &Sequence,
        outcome: SequenceOutcome,
        started_at: Option<Duration>,
        timestamp: Duration,
    ) -> EventId {
        let duration = started_at.map(|start| timestamp.saturating_sub(start));
        self.record(
            TelemetryEventKind::SequenceFinished,
            TelemetryPayload::Finish(FinishTelemetry {
                sequence: SequenceTelemetry::of(sequence),
                outcome,
                duration,
            }),
            timestamp,
        )
    }

    pub fn record_fault(
        &mut self,
        sequence: &Sequence,
        fault: RunnerFault,
        timestamp: Duration,
    ) -> EventId {
        self.record(
            TelemetryEventKind::RunnerFaulted,
            TelemetryPayload::Fault(FaultTelemetry {
                sequence: SequenceTelemetry::of(sequence),
                fault,
            }),
            timestamp,
        )
    }

    /// Records an enable (`true`) or disable transition.
    pub fn record_enabled(
        &mut self,
        enabled: bool,
        live_runners: usize,
        timestamp: Duration,
    ) -> EventId {
        let event = if enabled {
            TelemetryEventKind::ControllerEnabled
        } else {
            TelemetryEventKind::ControllerDisabled
        };
        self.record(
            event,
            TelemetryPayload::Controller {
                live_runners: truncate_count(live_runners),
            },
            timestamp,
        )
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    match u8::try_from(count) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceBuilder;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            (TelemetryEventKind::SequenceQueued, 0x0001),
            (TelemetryEventKind::StateStalled, 0x0011),
            (TelemetryEventKind::RunnerFaulted, 0x0021),
            (TelemetryEventKind::ControllerDisabled, 0x0031),
        ];
        for (event, code) in fixtures {
            assert_eq!(event.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), event);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x7777),
            TelemetryEventKind::Custom(0x7777)
        );
    }

    #[test]
    fn since_skips_already_drained_records() {
        let sequence = SequenceBuilder::new("spin up shooter").build();
        let mut recorder = TelemetryRecorder::<4>::new();
        recorder.record_queued(&sequence, Duration::from_millis(10));
        recorder.record_started(&sequence, Duration::from_millis(20));

        let cursor = recorder.next_event_id();
        assert_eq!(cursor, 2);
        recorder.record_finished(
            &sequence,
            SequenceOutcome::Completed,
            Some(Duration::from_millis(20)),
            Duration::from_millis(520),
        );

        let fresh: Vec<_> = recorder.since(cursor).collect();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].event, TelemetryEventKind::SequenceFinished);
        match fresh[0].details {
            TelemetryPayload::Finish(finish) => {
                assert_eq!(finish.duration, Some(Duration::from_millis(500)));
                assert_eq!(finish.sequence.name, "spin up shooter");
            }
            other => panic!("expected finish payload, got {other:?}"),
        }
    }

    #[test]
    fn ring_keeps_only_the_newest_records() {
        let sequence = SequenceBuilder::new("noisy").build();
        let mut recorder = TelemetryRecorder::<2>::new();
        for millis in 0..5 {
            recorder.record_queued(&sequence, Duration::from_millis(millis));
        }

        assert_eq!(recorder.len(), 2);
        let ids: Vec<_> = recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids, [3, 4]);
        assert_eq!(recorder.latest().map(|record| record.id), Some(4));
    }

    #[test]
    fn stall_records_render_cause_and_wait() {
        let sequence = SequenceBuilder::new("start shooting").build();
        let mut recorder = TelemetryRecorder::<8>::new();
        recorder.record_stalled(
            &sequence,
            StateSlot::Step(1),
            BlockedBy::ShooterHood,
            Duration::from_millis(750),
            Duration::from_millis(1_250),
        );

        let record = recorder.latest().copied().expect("stall recorded");
        assert_eq!(
            record.to_string(),
            "[   1.250s] state-stalled start shooting step 1 blocked by shooter hood for 750ms"
        );
        assert_eq!(
            record.details.sequence().map(|sequence| sequence.id),
            Some(sequence.id())
        );
    }

    #[test]
    fn controller_transitions_saturate_runner_count() {
        let mut recorder = TelemetryRecorder::<4>::new();
        recorder.record_enabled(false, 300, Duration::ZERO);
        let record = recorder.latest().copied().expect("transition recorded");
        assert_eq!(record.event, TelemetryEventKind::ControllerDisabled);
        assert_eq!(
            record.details,
            TelemetryPayload::Controller {
                live_runners: u8::MAX
            }
        );
    }
}
