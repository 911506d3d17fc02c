//! Tick task owning the controller.

use core::time::Duration;

use embassy_time::{Instant, Ticker};
use sequencer_core::controller::{Controller, TickReport};
use sequencer_core::subsystems::Subsystems;
use sequencer_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord};
use tracing::{debug, error, info, warn};

use crate::requests::{ControlRequest, DiagnosticsCell, RequestReceiver};

/// Shortest period the ticker is allowed to run at.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Owns the controller and the subsystems; the only code that mutates either.
pub struct ControllerTask<'a, S> {
    controller: Controller,
    subsystems: S,
    requests: RequestReceiver<'a>,
    diagnostics: &'a DiagnosticsCell,
    logged_through: EventId,
}

impl<'a, S> ControllerTask<'a, S>
where
    S: Subsystems,
{
    #[must_use]
    pub fn new(
        controller: Controller,
        subsystems: S,
        requests: RequestReceiver<'a>,
        diagnostics: &'a DiagnosticsCell,
    ) -> Self {
        let task = Self {
            logged_through: controller.telemetry().next_event_id(),
            controller,
            subsystems,
            requests,
            diagnostics,
        };
        task.publish();
        task
    }

    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[must_use]
    pub fn subsystems(&self) -> &S {
        &self.subsystems
    }

    /// One period: apply queued requests, tick, publish diagnostics and log
    /// whatever telemetry the tick produced.
    pub fn step(&mut self, now: Duration) -> TickReport {
        while let Ok(request) = self.requests.try_receive() {
            self.apply(request, now);
        }
        let report = self.controller.tick(&mut self.subsystems, now);
        self.publish();
        self.drain_telemetry();
        report
    }

    fn apply(&mut self, request: ControlRequest, now: Duration) {
        match request {
            ControlRequest::Run(sequence) => {
                if let Err(err) = self.controller.run(&sequence, now) {
                    warn!(sequence = sequence.name(), error = %err, "run request dropped");
                }
            }
            ControlRequest::Enable => self.controller.enable(now),
            ControlRequest::Disable => {
                let aborted = self.controller.disable(now);
                debug!(aborted, "disable request applied");
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.diagnostics();
        self.diagnostics
            .lock(|cell| *cell.borrow_mut() = snapshot);
    }

    fn drain_telemetry(&mut self) {
        let telemetry = self.controller.telemetry();
        for record in telemetry.since(self.logged_through) {
            log_record(record);
        }
        self.logged_through = telemetry.next_event_id();
    }

    /// Ticks forever at the configured period.
    pub async fn run(mut self) -> ! {
        let period = self
            .controller
            .config()
            .tick_period()
            .max(MIN_TICK_PERIOD);
        let micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
        let mut ticker = Ticker::every(embassy_time::Duration::from_micros(micros));
        let epoch = Instant::now();
        info!(tick_ms = millis(period), "controller task running");

        loop {
            ticker.next().await;
            let now = Duration::from_micros(epoch.elapsed().as_micros());
            self.step(now);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Emits one telemetry record through `tracing`.
pub fn log_record(record: &TelemetryRecord) {
    let at_ms = millis(record.timestamp);
    match record.details {
        TelemetryPayload::Stall(stall) => warn!(
            at_ms,
            sequence = stall.sequence.name,
            state = %stall.slot,
            blocked_by = stall.blocked_by.label(),
            waited_ms = millis(stall.waited),
            "state stalled"
        ),
        TelemetryPayload::Rejection { sequence, reason } => warn!(
            at_ms,
            sequence = sequence.name,
            reason = reason.label(),
            "sequence rejected"
        ),
        TelemetryPayload::Fault(fault) => error!(
            at_ms,
            sequence = fault.sequence.name,
            fault = %fault.fault,
            "runner faulted"
        ),
        TelemetryPayload::State(state) => info!(
            at_ms,
            sequence = state.sequence.name,
            state = %state.slot,
            log = state.log,
            "state entered"
        ),
        TelemetryPayload::Abort(abort) => info!(
            at_ms,
            sequence = abort.sequence.name,
            aborted_by = abort.aborted_by.map(|by| by.name),
            "sequence aborted"
        ),
        TelemetryPayload::Finish(finish) => info!(
            at_ms,
            sequence = finish.sequence.name,
            outcome = ?finish.outcome,
            duration_ms = finish.duration.map(millis),
            "sequence finished"
        ),
        TelemetryPayload::Sequence(sequence) => {
            info!(at_ms, sequence = sequence.name, event = %record.event, "sequence event");
        }
        TelemetryPayload::Controller { live_runners } => {
            info!(at_ms, live_runners, event = %record.event, "controller event");
        }
        TelemetryPayload::None => info!(at_ms, event = %record.event, "telemetry event"),
    }
}
