#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sequencer_core::state::{DriveRoutine, IntakePosition, LedColour, Pose, Side};
use sequencer_core::subsystems::{
    Drivebase, DutyCycle, Gamepad, Intake, LedStrip, Location, Shooter, SubsystemFault,
    SubsystemId, SubsystemResult, Subsystems,
};

/// One command pushed to a mock mechanism.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Recorded {
    DriveRoutine(DriveRoutine),
    Pose(Pose),
    IntakePosition(IntakePosition),
    IntakeRps(f64),
    DutyCycle(SubsystemId, f64),
    ShooterRps(f64),
    HoodAngle(f64),
    Colour(LedColour),
    Alliance,
    Rumble(Side, f64),
}

type Log = Rc<RefCell<Vec<Recorded>>>;

struct Recorder {
    id: SubsystemId,
    log: Log,
    faulty: bool,
}

impl Recorder {
    fn new(id: SubsystemId, log: &Log) -> Self {
        Self {
            id,
            log: Rc::clone(log),
            faulty: false,
        }
    }

    fn check(&self) -> SubsystemResult {
        if self.faulty {
            Err(SubsystemFault::new(self.id, "injected fault"))
        } else {
            Ok(())
        }
    }

    fn record(&self, command: Recorded) -> SubsystemResult {
        self.check()?;
        self.log.borrow_mut().push(command);
        Ok(())
    }
}

struct MockDrivebase {
    recorder: Recorder,
    finished: bool,
}

impl Drivebase for MockDrivebase {
    fn set_drive_routine(&mut self, routine: DriveRoutine) -> SubsystemResult {
        self.recorder.record(Recorded::DriveRoutine(routine))
    }

    fn has_finished(&self) -> SubsystemResult<bool> {
        self.recorder.check()?;
        Ok(self.finished)
    }
}

struct MockLocation {
    recorder: Recorder,
}

impl Location for MockLocation {
    fn set_current_pose(&mut self, pose: Pose) -> SubsystemResult {
        self.recorder.record(Recorded::Pose(pose))
    }
}

struct MockIntake {
    recorder: Recorder,
    in_position: bool,
}

impl Intake for MockIntake {
    fn set_position(&mut self, position: IntakePosition) -> SubsystemResult {
        self.recorder.record(Recorded::IntakePosition(position))
    }

    fn is_in_position(&self) -> SubsystemResult<bool> {
        self.recorder.check()?;
        Ok(self.in_position)
    }

    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult {
        self.recorder.record(Recorded::IntakeRps(rps))
    }
}

struct MockMotor {
    recorder: Recorder,
}

impl DutyCycle for MockMotor {
    fn set_duty_cycle(&mut self, duty: f64) -> SubsystemResult {
        self.recorder.record(Recorded::DutyCycle(self.recorder.id, duty))
    }
}

struct MockShooter {
    recorder: Recorder,
    at_speed: bool,
    hood_at_angle: bool,
}

impl Shooter for MockShooter {
    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult {
        self.recorder.record(Recorded::ShooterRps(rps))
    }

    fn is_at_target_speed(&self) -> SubsystemResult<bool> {
        self.recorder.check()?;
        Ok(self.at_speed)
    }

    fn set_hood_angle(&mut self, degrees: f64) -> SubsystemResult {
        self.recorder.record(Recorded::HoodAngle(degrees))
    }

    fn is_hood_at_target_angle(&self) -> SubsystemResult<bool> {
        self.recorder.check()?;
        Ok(self.hood_at_angle)
    }
}

struct MockLed {
    recorder: Recorder,
}

impl LedStrip for MockLed {
    fn set_colour(&mut self, colour: LedColour) -> SubsystemResult {
        self.recorder.record(Recorded::Colour(colour))
    }

    fn set_alliance(&mut self) -> SubsystemResult {
        self.recorder.record(Recorded::Alliance)
    }
}

struct MockGamepad {
    recorder: Recorder,
}

impl Gamepad for MockGamepad {
    fn set_rumble(&mut self, side: Side, intensity: f64) -> SubsystemResult {
        self.recorder.record(Recorded::Rumble(side, intensity))
    }
}

/// Robot that records every command and reports scripted predicates.
///
/// Every predicate starts satisfied.
pub struct MockRobot {
    log: Log,
    drivebase: MockDrivebase,
    location: MockLocation,
    intake: MockIntake,
    velcro: MockMotor,
    conveyor: MockMotor,
    feeders: [MockMotor; 2],
    shooter: MockShooter,
    climbers: [MockMotor; 2],
    led: MockLed,
    gamepad: MockGamepad,
}

impl MockRobot {
    pub fn new() -> Self {
        let log = Log::default();
        let motor = |id| MockMotor {
            recorder: Recorder::new(id, &log),
        };
        Self {
            drivebase: MockDrivebase {
                recorder: Recorder::new(SubsystemId::Drivebase, &log),
                finished: true,
            },
            location: MockLocation {
                recorder: Recorder::new(SubsystemId::Location, &log),
            },
            intake: MockIntake {
                recorder: Recorder::new(SubsystemId::Intake, &log),
                in_position: true,
            },
            velcro: motor(SubsystemId::Velcro),
            conveyor: motor(SubsystemId::Conveyor),
            feeders: [motor(SubsystemId::FeederLeft), motor(SubsystemId::FeederRight)],
            shooter: MockShooter {
                recorder: Recorder::new(SubsystemId::Shooter, &log),
                at_speed: true,
                hood_at_angle: true,
            },
            climbers: [
                motor(SubsystemId::ClimberLeft),
                motor(SubsystemId::ClimberRight),
            ],
            led: MockLed {
                recorder: Recorder::new(SubsystemId::LedStrip, &log),
            },
            gamepad: MockGamepad {
                recorder: Recorder::new(SubsystemId::Gamepad, &log),
            },
            log,
        }
    }

    pub fn commands(&self) -> Vec<Recorded> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Most recent duty cycle written to `id`.
    pub fn last_duty(&self, id: SubsystemId) -> Option<f64> {
        self.log.borrow().iter().rev().find_map(|command| match command {
            Recorded::DutyCycle(target, duty) if *target == id => Some(*duty),
            _ => None,
        })
    }

    pub fn last_shooter_rps(&self) -> Option<f64> {
        self.log.borrow().iter().rev().find_map(|command| match command {
            Recorded::ShooterRps(rps) => Some(*rps),
            _ => None,
        })
    }

    pub fn last_intake_rps(&self) -> Option<f64> {
        self.log.borrow().iter().rev().find_map(|command| match command {
            Recorded::IntakeRps(rps) => Some(*rps),
            _ => None,
        })
    }

    pub fn drive_commands(&self) -> Vec<DriveRoutine> {
        self.log
            .borrow()
            .iter()
            .filter_map(|command| match command {
                Recorded::DriveRoutine(routine) => Some(*routine),
                _ => None,
            })
            .collect()
    }

    pub fn set_drive_finished(&mut self, finished: bool) {
        self.drivebase.finished = finished;
    }

    pub fn set_intake_in_position(&mut self, in_position: bool) {
        self.intake.in_position = in_position;
    }

    pub fn set_shooter_at_speed(&mut self, at_speed: bool) {
        self.shooter.at_speed = at_speed;
    }

    pub fn set_hood_at_angle(&mut self, at_angle: bool) {
        self.shooter.hood_at_angle = at_angle;
    }

    /// Makes every call on `id` fail from now on.
    pub fn inject_fault(&mut self, id: SubsystemId) {
        let recorder = match id {
            SubsystemId::Drivebase => &mut self.drivebase.recorder,
            SubsystemId::Location => &mut self.location.recorder,
            SubsystemId::Intake => &mut self.intake.recorder,
            SubsystemId::Velcro => &mut self.velcro.recorder,
            SubsystemId::Conveyor => &mut self.conveyor.recorder,
            SubsystemId::FeederLeft => &mut self.feeders[0].recorder,
            SubsystemId::FeederRight => &mut self.feeders[1].recorder,
            SubsystemId::Shooter => &mut self.shooter.recorder,
            SubsystemId::ClimberLeft => &mut self.climbers[0].recorder,
            SubsystemId::ClimberRight => &mut self.climbers[1].recorder,
            SubsystemId::LedStrip => &mut self.led.recorder,
            SubsystemId::Gamepad => &mut self.gamepad.recorder,
        };
        recorder.faulty = true;
    }
}

impl Subsystems for MockRobot {
    fn drivebase(&mut self) -> &mut dyn Drivebase {
        &mut self.drivebase
    }

    fn location(&mut self) -> &mut dyn Location {
        &mut self.location
    }

    fn intake(&mut self) -> &mut dyn Intake {
        &mut self.intake
    }

    fn velcro(&mut self) -> &mut dyn DutyCycle {
        &mut self.velcro
    }

    fn conveyor(&mut self) -> &mut dyn DutyCycle {
        &mut self.conveyor
    }

    fn feeder(&mut self, side: Side) -> &mut dyn DutyCycle {
        match side {
            Side::Left => &mut self.feeders[0],
            Side::Right => &mut self.feeders[1],
        }
    }

    fn shooter(&mut self) -> &mut dyn Shooter {
        &mut self.shooter
    }

    fn climber(&mut self, side: Side) -> &mut dyn DutyCycle {
        match side {
            Side::Left => &mut self.climbers[0],
            Side::Right => &mut self.climbers[1],
        }
    }

    fn led_strip(&mut self) -> &mut dyn LedStrip {
        &mut self.led
    }

    fn gamepad(&mut self) -> &mut dyn Gamepad {
        &mut self.gamepad
    }
}
