//! Host runtime for the sequencer.
//!
//! [`start`] moves a [`Controller`] and its subsystems onto a dedicated
//! `sequencer-tick` thread running an Embassy executor, and hands back a
//! [`ControllerHandle`] that reaches the controller only through the request
//! queue.

use std::thread;

use embassy_executor::Executor;
use portable_atomic::{AtomicBool, Ordering};
use sequencer_core::controller::{Controller, ControllerConfig};
use sequencer_core::subsystems::Subsystems;
use static_cell::StaticCell;
use tracing::{error, info};

pub mod requests;
pub mod task;

pub use requests::{
    ControlRequest, ControllerHandle, DiagnosticsCell, REQUEST_QUEUE_DEPTH, RequestError,
    RequestQueue,
};
pub use task::ControllerTask;

/// Subsystems owned by the tick thread.
pub type BoxedSubsystems = Box<dyn Subsystems + Send>;

/// Runtime tuning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
}

impl RuntimeConfig {
    pub const DEFAULT: Self = Self::new(ControllerConfig::DEFAULT);

    #[must_use]
    pub const fn new(controller: ControllerConfig) -> Self {
        Self { controller }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    /// The runtime owns process-wide statics and can only start once.
    AlreadyStarted,
    Spawn(std::io::Error),
}

impl core::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RuntimeError::AlreadyStarted => f.write_str("sequencer runtime already started"),
            RuntimeError::Spawn(err) => write!(f, "failed to spawn tick thread: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::AlreadyStarted => None,
            RuntimeError::Spawn(err) => Some(err),
        }
    }
}

static STARTED: AtomicBool = AtomicBool::new(false);
static REQUESTS: RequestQueue = RequestQueue::new();
static DIAGNOSTICS: StaticCell<DiagnosticsCell> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[embassy_executor::task]
async fn tick_task(task: ControllerTask<'static, BoxedSubsystems>) -> ! {
    task.run().await
}

fn run_executor(task: ControllerTask<'static, BoxedSubsystems>) {
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        if let Err(err) = spawner.spawn(tick_task(task)) {
            error!(error = ?err, "failed to spawn controller task");
        }
    })
}

/// Starts the tick thread.
///
/// # Errors
///
/// Returns [`RuntimeError::AlreadyStarted`] on every call after the first,
/// or [`RuntimeError::Spawn`] when the OS refuses to create the thread.
pub fn start(
    config: RuntimeConfig,
    subsystems: BoxedSubsystems,
) -> Result<ControllerHandle<'static>, RuntimeError> {
    if STARTED.swap(true, Ordering::AcqRel) {
        return Err(RuntimeError::AlreadyStarted);
    }

    let diagnostics: &'static DiagnosticsCell = DIAGNOSTICS.init(requests::diagnostics_cell());
    let task = ControllerTask::new(
        Controller::new(config.controller),
        subsystems,
        REQUESTS.receiver(),
        diagnostics,
    );

    thread::Builder::new()
        .name("sequencer-tick".into())
        .spawn(move || run_executor(task))
        .map_err(RuntimeError::Spawn)?;

    info!(
        enabled = config.controller.start_enabled(),
        "sequencer runtime started"
    );
    Ok(ControllerHandle::new(REQUESTS.sender(), diagnostics))
}
