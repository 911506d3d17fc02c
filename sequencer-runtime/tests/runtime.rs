use core::time::Duration;
use std::thread;
use std::time::Instant;

use sequencer_core::controller::ControllerDiagnostics;
use sequencer_core::runner::RunStatus;
use sequencer_core::sequence::SequenceBuilder;
use sequencer_core::subsystems::NoopSubsystems;
use sequencer_runtime::{ControllerHandle, RuntimeConfig, RuntimeError};

fn wait_for(
    handle: &ControllerHandle<'_>,
    limit: Duration,
    done: impl Fn(&ControllerDiagnostics) -> bool,
) -> ControllerDiagnostics {
    let deadline = Instant::now() + limit;
    loop {
        let diagnostics = handle.diagnostics();
        if done(&diagnostics) || Instant::now() >= deadline {
            return diagnostics;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

// The runtime owns process-wide statics, so the whole lifecycle lives in one test.
#[test]
fn runtime_runs_sequences_on_its_own_thread() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let handle = sequencer_runtime::start(RuntimeConfig::default(), Box::new(NoopSubsystems::new()))
        .expect("first start");

    let mut builder = SequenceBuilder::new("pause");
    builder.then().delay_for(Duration::from_millis(200));
    let pause = builder.build();

    handle.enable().expect("enable");
    handle.run(pause).expect("run");

    let running = wait_for(&handle, Duration::from_secs(1), |diagnostics| {
        !diagnostics.running.is_empty()
    });
    assert!(running.enabled);
    assert_eq!(running.running[0].name, "pause");
    assert_eq!(running.running[0].status, RunStatus::Running);

    let finished = wait_for(&handle, Duration::from_secs(2), |diagnostics| {
        diagnostics.running.is_empty() && diagnostics.waiting == 0
    });
    assert!(finished.running.is_empty(), "pause never finished");

    handle.disable().expect("disable");
    let disabled = wait_for(&handle, Duration::from_secs(1), |diagnostics| {
        !diagnostics.enabled
    });
    assert!(!disabled.enabled);

    let again = sequencer_runtime::start(RuntimeConfig::default(), Box::new(NoopSubsystems::new()));
    assert!(matches!(again, Err(RuntimeError::AlreadyStarted)));
}
