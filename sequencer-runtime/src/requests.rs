//! Request channel between callers and the tick task.
//!
//! Every mutation of the runner set travels through [`RequestQueue`] and is
//! applied by the tick task at the start of a tick. Diagnostics travel the
//! other way through a [`DiagnosticsCell`] the task rewrites once per tick.

use core::cell::RefCell;
use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use sequencer_core::controller::ControllerDiagnostics;
use sequencer_core::repl::commands::{Advance, ControlPort, RunAck};
use sequencer_core::sequence::Sequence;

/// Depth of the request queue shared between callers and the tick task.
pub const REQUEST_QUEUE_DEPTH: usize = 8;

type RequestMutex = CriticalSectionRawMutex;

/// Mutation requested of the controller.
#[derive(Clone, Debug)]
pub enum ControlRequest {
    Run(Arc<Sequence>),
    Enable,
    Disable,
}

impl ControlRequest {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::Run(_) => "run",
            ControlRequest::Enable => "enable",
            ControlRequest::Disable => "disable",
        }
    }
}

/// Queue used to hand requests to the tick task.
pub type RequestQueue = Channel<RequestMutex, ControlRequest, REQUEST_QUEUE_DEPTH>;

/// Convenience sender type alias for the request queue.
pub type RequestSender<'a> = Sender<'a, RequestMutex, ControlRequest, REQUEST_QUEUE_DEPTH>;

/// Convenience receiver type alias for the request queue.
pub type RequestReceiver<'a> = Receiver<'a, RequestMutex, ControlRequest, REQUEST_QUEUE_DEPTH>;

/// Latest diagnostics snapshot published by the tick task.
pub type DiagnosticsCell = Mutex<RequestMutex, RefCell<ControllerDiagnostics>>;

/// Creates an empty diagnostics cell.
#[must_use]
pub fn diagnostics_cell() -> DiagnosticsCell {
    Mutex::new(RefCell::new(ControllerDiagnostics::default()))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestError {
    /// The tick task has not drained earlier requests yet.
    QueueFull { request: &'static str },
    /// Time is driven by the runtime's ticker and cannot be advanced by hand.
    ManualClockOnly,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::QueueFull { request } => {
                write!(f, "request queue full, dropped `{request}`")
            }
            RequestError::ManualClockOnly => {
                f.write_str("the live runtime ticks on its own; restart with --manual to step time")
            }
        }
    }
}

/// Cloneable handle for submitting requests and reading diagnostics.
#[derive(Clone, Copy)]
pub struct ControllerHandle<'a> {
    sender: RequestSender<'a>,
    diagnostics: &'a DiagnosticsCell,
}

impl<'a> ControllerHandle<'a> {
    #[must_use]
    pub fn new(sender: RequestSender<'a>, diagnostics: &'a DiagnosticsCell) -> Self {
        Self {
            sender,
            diagnostics,
        }
    }

    fn submit(&self, request: ControlRequest) -> Result<(), RequestError> {
        let name = request.name();
        match self.sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RequestError::QueueFull { request: name }),
        }
    }

    /// Queues `sequence` for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::QueueFull`] when the tick task is behind.
    pub fn run(&self, sequence: Arc<Sequence>) -> Result<(), RequestError> {
        self.submit(ControlRequest::Run(sequence))
    }

    /// # Errors
    ///
    /// Returns [`RequestError::QueueFull`] when the tick task is behind.
    pub fn enable(&self) -> Result<(), RequestError> {
        self.submit(ControlRequest::Enable)
    }

    /// # Errors
    ///
    /// Returns [`RequestError::QueueFull`] when the tick task is behind.
    pub fn disable(&self) -> Result<(), RequestError> {
        self.submit(ControlRequest::Disable)
    }

    /// Snapshot published at the end of the most recent tick.
    #[must_use]
    pub fn diagnostics(&self) -> ControllerDiagnostics {
        self.diagnostics.lock(|cell| cell.borrow().clone())
    }
}

impl ControlPort for ControllerHandle<'_> {
    type Error = RequestError;

    fn run(&mut self, sequence: Arc<Sequence>) -> Result<RunAck, Self::Error> {
        ControllerHandle::run(self, sequence).map(|()| RunAck::Submitted)
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        ControllerHandle::enable(self)
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        ControllerHandle::disable(self)
    }

    fn diagnostics(&self) -> ControllerDiagnostics {
        ControllerHandle::diagnostics(self)
    }

    fn advance(&mut self, _advance: Advance) -> Result<Duration, Self::Error> {
        Err(RequestError::ManualClockOnly)
    }
}
