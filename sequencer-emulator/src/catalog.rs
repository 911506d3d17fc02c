//! Demo sequences exposed through `run <name>`.

use std::sync::Arc;
use std::time::Duration;

use sequencer_core::repl::commands::SequenceCatalog;
use sequencer_core::sequence::{Sequence, SequenceBuilder};
use sequencer_core::state::{DriveRoutine, DriveRoutineKind, LedColour, Side};

const INTAKE_RPS: f64 = 90.0;
const VELCRO_DUTY: f64 = 0.3;
const CONVEYOR_DUTY: f64 = 1.0;
const CONVEYOR_IDLE_DUTY: f64 = 0.3;
const FEEDER_DUTY: f64 = 1.0;
const FEEDER_STAGGER: Duration = Duration::from_millis(600);
const CLIMBER_DUTY: f64 = 0.3;
const SHOOTER_RPS: f64 = 60.0;
const HOOD_ANGLE: f64 = 30.0;
const HOOD_RESET_ANGLE: f64 = 15.0;
const UNSTICK_POWER: f64 = 0.22;
const UNSTICK_TIME: Duration = Duration::from_millis(500);

fn default_drive() -> DriveRoutine {
    DriveRoutine::new(DriveRoutineKind::Cheesy)
}

fn empty() -> SequenceBuilder {
    SequenceBuilder::new("empty")
}

fn reset() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("reset");
    builder.then().set_drive_routine(default_drive());
    builder
}

fn start_intaking() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("start-intaking");
    builder.then().deploy_intake();
    builder
        .then()
        .set_intake_rps(INTAKE_RPS)
        .set_velcro_duty_cycle(VELCRO_DUTY)
        .set_conveyor_duty_cycle(CONVEYOR_DUTY);
    builder
}

fn stop_intaking() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("stop-intaking");
    builder.then().set_intake_rps(0.0).set_velcro_duty_cycle(0.0);
    builder
        .then()
        .set_conveyor_duty_cycle(CONVEYOR_IDLE_DUTY);
    builder.create_interrupt_state();
    builder
}

fn reverse_intaking() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("reverse-intaking");
    builder.then().deploy_intake();
    builder
        .then()
        .set_conveyor_duty_cycle(0.0)
        .set_feeder_duty_cycle(Side::Left, -FEEDER_DUTY);
    builder.then().delay_for(Duration::from_millis(500));
    builder
        .then()
        .set_intake_rps(-INTAKE_RPS)
        .set_velcro_duty_cycle(-VELCRO_DUTY)
        .set_conveyor_duty_cycle(-CONVEYOR_DUTY)
        .set_feeder_duty_cycle(Side::Right, -FEEDER_DUTY);
    builder
}

fn raise_intake() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("raise-intake");
    builder.then().stow_intake();
    builder
}

fn start_conveyor() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("start-conveyor");
    builder.then().set_conveyor_duty_cycle(CONVEYOR_DUTY);
    builder
}

fn stop_conveyor() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("stop-conveyor");
    builder.then().set_conveyor_duty_cycle(0.0);
    builder
}

fn spin_up_shooter() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("spin-up-shooter");
    builder.then().set_rumble(0.0);
    builder
        .then_logged("spinning up")
        .set_hood_angle(HOOD_ANGLE)
        .set_shooter_rps(SHOOTER_RPS);
    builder.then().wait_for_shooter().wait_for_hood();
    builder.then_logged("ready to shoot").set_rumble(0.75);
    builder
}

fn start_shooting() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("start-shooting");
    builder.then().set_conveyor_duty_cycle(CONVEYOR_DUTY);
    builder.then().set_rumble(0.0);
    builder.then().wait_for_hood();
    builder
        .then()
        .set_feeder_duty_cycle(Side::Left, FEEDER_DUTY);
    builder.then().delay_for(FEEDER_STAGGER);
    builder
        .then()
        .set_feeder_duty_cycle(Side::Right, FEEDER_DUTY);
    builder
}

fn stop_shooting() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("stop-shooting");
    builder
        .then()
        .set_shooter_rps(0.0)
        .set_feeder_duty_cycle(Side::Left, 0.0)
        .set_feeder_duty_cycle(Side::Right, 0.0)
        .set_conveyor_duty_cycle(CONVEYOR_IDLE_DUTY)
        .set_hood_angle(HOOD_RESET_ANGLE)
        .set_rumble(0.0);
    builder.create_interrupt_state();
    builder
}

fn climber(name: &'static str, side: Side, duty: f64) -> SequenceBuilder {
    let mut builder = SequenceBuilder::new(name);
    builder.then().set_climber_duty_cycle(side, duty);
    builder
}

fn stop_climber(name: &'static str, side: Side) -> SequenceBuilder {
    let mut builder = climber(name, side, 0.0);
    builder.create_interrupt_state();
    builder
}

fn set_leds() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("set-leds");
    builder.then().set_led_colour(LedColour::Green);
    builder
}

fn unstick_wheels_after_climb() -> SequenceBuilder {
    let mut builder = SequenceBuilder::new("unstick-wheels-after-climb");
    builder.then().set_drivebase_power(UNSTICK_POWER);
    builder.then().delay_for(UNSTICK_TIME);
    builder.then().set_drive_routine(default_drive());
    builder
}

/// Fixed set of demo sequences, built once.
pub struct Catalog {
    sequences: Vec<Arc<Sequence>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        let builders = [
            empty(),
            reset(),
            start_intaking(),
            stop_intaking(),
            reverse_intaking(),
            raise_intake(),
            start_conveyor(),
            stop_conveyor(),
            spin_up_shooter(),
            start_shooting(),
            stop_shooting(),
            climber("extend-climber-left", Side::Left, CLIMBER_DUTY),
            climber("extend-climber-right", Side::Right, CLIMBER_DUTY),
            climber("retract-climber-left", Side::Left, -CLIMBER_DUTY),
            climber("retract-climber-right", Side::Right, -CLIMBER_DUTY),
            stop_climber("stop-climber-left", Side::Left),
            stop_climber("stop-climber-right", Side::Right),
            set_leds(),
            unstick_wheels_after_climb(),
        ];
        Self {
            sequences: builders.into_iter().map(SequenceBuilder::build).collect(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCatalog for Catalog {
    fn find(&self, name: &str) -> Option<Arc<Sequence>> {
        self.sequences
            .iter()
            .find(|sequence| sequence.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    fn names(&self) -> Vec<&'static str> {
        self.sequences.iter().map(|sequence| sequence.name()).collect()
    }
}
