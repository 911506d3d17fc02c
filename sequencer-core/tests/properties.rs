mod support;

use core::time::Duration;
use std::sync::Arc;

use proptest::prelude::*;
use sequencer_core::controller::{Controller, ControllerConfig};
use sequencer_core::sequence::{Sequence, SequenceBuilder};
use sequencer_core::state::{Side, State, Target, TargetKey};
use support::MockRobot;

#[derive(Clone, Debug)]
enum Op {
    Run(usize),
    Tick(u8),
    Disable,
    Enable,
    Intake(bool),
    Shooter(bool),
    Drive(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..6usize).prop_map(Op::Run),
        4 => (1..20u8).prop_map(Op::Tick),
        1 => Just(Op::Disable),
        1 => Just(Op::Enable),
        1 => any::<bool>().prop_map(Op::Intake),
        1 => any::<bool>().prop_map(Op::Shooter),
        1 => any::<bool>().prop_map(Op::Drive),
    ]
}

fn catalog() -> Vec<Arc<Sequence>> {
    let mut sequences = Vec::new();

    let mut builder = SequenceBuilder::new("start intaking");
    builder.then().deploy_intake();
    builder
        .then()
        .set_intake_rps(10.0)
        .set_conveyor_duty_cycle(0.5)
        .delay_for(Duration::from_millis(40));
    builder.create_interrupt_state();
    sequences.push(builder.build());

    let mut builder = SequenceBuilder::new("stop intaking");
    builder.then().stow_intake().set_intake_rps(0.0);
    sequences.push(builder.build());

    let mut builder = SequenceBuilder::new("start shooting");
    builder.then().set_shooter_rps(100.0).wait_for_shooter();
    builder
        .then()
        .set_conveyor_duty_cycle(1.0)
        .delay_for(Duration::from_millis(30));
    builder.on_interrupt().set_conveyor_duty_cycle(0.0);
    sequences.push(builder.build());

    let mut builder = SequenceBuilder::new("drive");
    builder.then().set_drivebase_power(0.3);
    sequences.push(builder.build());

    let mut builder = SequenceBuilder::new("drive and aim");
    builder
        .then()
        .set_drivebase_speed(0.5)
        .set_hood_angle(40.0)
        .wait_for_hood();
    sequences.push(builder.build());

    let mut builder = SequenceBuilder::new("climb");
    builder
        .then()
        .set_climber_duty_cycle(Side::Left, 1.0)
        .set_climber_duty_cycle(Side::Right, 1.0)
        .delay_for(Duration::from_millis(20));
    builder.create_interrupt_state();
    sequences.push(builder.build());

    sequences
}

fn assert_invariants(controller: &Controller) -> Result<(), TestCaseError> {
    let running: Vec<_> = controller.running().collect();
    for (index, first) in running.iter().enumerate() {
        for second in &running[index + 1..] {
            prop_assert!(
                !first.sequence().conflicts_with(second.sequence()),
                "{} and {} running together",
                first.sequence().name(),
                second.sequence().name()
            );
        }
    }
    let runners = controller.runners();
    for (index, runner) in runners.iter().enumerate() {
        prop_assert!(
            runners[index + 1..]
                .iter()
                .all(|other| other.sequence().id() != runner.sequence().id()),
            "{} queued twice",
            runner.sequence().name()
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn conflicting_runners_never_run_together(ops in prop::collection::vec(op(), 1..80)) {
        let sequences = catalog();
        let mut controller = Controller::new(ControllerConfig::default().with_start_enabled(true));
        let mut robot = MockRobot::new();
        let mut now = Duration::ZERO;
        let tick = controller.config().tick_period();

        for op in ops {
            match op {
                Op::Run(index) => {
                    controller.run(&sequences[index], now).expect("runner table has room");
                }
                Op::Tick(count) => {
                    for _ in 0..count {
                        now += tick;
                        controller.tick(&mut robot, now);
                        assert_invariants(&controller)?;
                    }
                }
                Op::Disable => {
                    controller.disable(now);
                }
                Op::Enable => controller.enable(now),
                Op::Intake(ready) => robot.set_intake_in_position(ready),
                Op::Shooter(ready) => robot.set_shooter_at_speed(ready),
                Op::Drive(ready) => {
                    robot.set_drive_finished(ready);
                    robot.set_hood_at_angle(ready);
                }
            }
            assert_invariants(&controller)?;
        }
    }

    #[test]
    fn derived_end_state_keeps_the_last_write(
        steps in prop::collection::vec(
            prop::collection::vec((0..7usize, -100i32..100), 0..5),
            0..6,
        )
    ) {
        let mut builder = SequenceBuilder::new("fold");
        let mut expected: Vec<Option<f64>> = vec![None; 7];
        for writes in &steps {
            let state = builder.then();
            for &(key, raw) in writes {
                let value = f64::from(raw);
                write(state, key, value);
                expected[key] = Some(value);
            }
        }
        builder.create_interrupt_state();
        let sequence = builder.build();
        let end = sequence.end_state();

        for (key, want) in expected.iter().enumerate() {
            let got = read(end, key);
            if target_key(key).settles_on_interrupt() {
                prop_assert_eq!(got, *want, "key {}", target_key(key).name());
            } else {
                prop_assert_eq!(got, None, "key {}", target_key(key).name());
            }
        }
    }
}

fn target_key(key: usize) -> TargetKey {
    match key {
        0 => TargetKey::IntakeRps,
        1 => TargetKey::ConveyorDutyCycle,
        2 => TargetKey::ShooterRps,
        3 => TargetKey::HoodAngle,
        4 => TargetKey::ClimberLeft,
        5 => TargetKey::FeederRight,
        _ => TargetKey::Drive,
    }
}

fn write(state: &mut State, key: usize, value: f64) {
    match key {
        0 => state.set_intake_rps(value),
        1 => state.set_conveyor_duty_cycle(value),
        2 => state.set_shooter_rps(value),
        3 => state.set_hood_angle(value),
        4 => state.set_climber_duty_cycle(Side::Left, value),
        5 => state.set_feeder_duty_cycle(Side::Right, value),
        _ => state.set_drivebase_power(value),
    };
}

fn read(state: &State, key: usize) -> Option<f64> {
    match state.get(target_key(key))? {
        Target::IntakeRps(value)
        | Target::ConveyorDutyCycle(value)
        | Target::ShooterRps(value)
        | Target::HoodAngle(value)
        | Target::Climber(_, value)
        | Target::Feeder(_, value) => Some(value),
        Target::Drive(routine) => Some(routine.value),
        other => panic!("unexpected target {other:?}"),
    }
}
