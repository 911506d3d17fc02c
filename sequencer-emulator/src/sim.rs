//! Simulated robot driven by the controller's tick clock.
//!
//! Each mechanism is a first-order model advanced in [`Subsystems::begin_tick`]
//! by the time elapsed since the previous tick, so manual (`tick`/`wait`) and
//! live sessions see the same convergence behaviour.

use core::time::Duration;

use sequencer_core::state::{DriveRoutine, IntakePosition, LedColour, Pose, Side};
use sequencer_core::subsystems::{
    Drivebase, DutyCycle, Gamepad, Intake, LedStrip, Location, Shooter, SubsystemId,
    SubsystemResult, Subsystems,
};
use tracing::debug;

/// Time the intake arm needs to travel between stops.
pub const INTAKE_TRAVEL: Duration = Duration::from_millis(300);

/// Flywheel acceleration in rps per second.
pub const SHOOTER_ACCELERATION: f64 = 200.0;

/// Flywheel speed counted as "at target".
pub const SHOOTER_TOLERANCE: f64 = 1.0;

/// Hood slew rate in degrees per second.
pub const HOOD_SLEW_RATE: f64 = 60.0;

pub const HOOD_TOLERANCE: f64 = 0.5;

/// Time a goal-seeking drive routine takes to reach its goal.
pub const DRIVE_ROUTINE_TIME: Duration = Duration::from_secs(1);

/// Moves `current` toward `target` by at most `step`.
fn approach(current: f64, target: f64, step: f64) -> f64 {
    if (target - current).abs() <= step {
        target
    } else if target > current {
        current + step
    } else {
        current - step
    }
}

#[derive(Debug, Default)]
struct SimDrivebase {
    routine: Option<DriveRoutine>,
    running_for: Duration,
}

impl SimDrivebase {
    fn advance(&mut self, elapsed: Duration) {
        if self.routine.is_some() {
            self.running_for = self.running_for.saturating_add(elapsed);
        }
    }
}

impl Drivebase for SimDrivebase {
    fn set_drive_routine(&mut self, routine: DriveRoutine) -> SubsystemResult {
        debug!(routine = %routine, "drive routine installed");
        self.routine = Some(routine);
        self.running_for = Duration::ZERO;
        Ok(())
    }

    fn has_finished(&self) -> SubsystemResult<bool> {
        Ok(match self.routine {
            None => true,
            Some(routine) if routine.kind.is_open_ended() => true,
            Some(_) => self.running_for >= DRIVE_ROUTINE_TIME,
        })
    }
}

#[derive(Debug, Default)]
struct SimLocation {
    pose: Pose,
}

impl Location for SimLocation {
    fn set_current_pose(&mut self, pose: Pose) -> SubsystemResult {
        debug!(x = pose.x, y = pose.y, heading = pose.heading_degrees, "pose reset");
        self.pose = pose;
        Ok(())
    }
}

#[derive(Debug)]
struct SimIntake {
    position: IntakePosition,
    travel_left: Duration,
    rps: f64,
}

impl SimIntake {
    fn advance(&mut self, elapsed: Duration) {
        self.travel_left = self.travel_left.saturating_sub(elapsed);
    }
}

impl Intake for SimIntake {
    fn set_position(&mut self, position: IntakePosition) -> SubsystemResult {
        if position != self.position {
            debug!(?position, "intake moving");
            self.position = position;
            self.travel_left = INTAKE_TRAVEL;
        }
        Ok(())
    }

    fn is_in_position(&self) -> SubsystemResult<bool> {
        Ok(self.travel_left.is_zero())
    }

    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult {
        debug!(rps, "intake roller set");
        self.rps = rps;
        Ok(())
    }
}

#[derive(Debug)]
struct SimMotor {
    id: SubsystemId,
    duty: f64,
}

impl SimMotor {
    const fn new(id: SubsystemId) -> Self {
        Self { id, duty: 0.0 }
    }
}

impl DutyCycle for SimMotor {
    fn set_duty_cycle(&mut self, duty: f64) -> SubsystemResult {
        debug!(motor = self.id.name(), duty, "duty cycle set");
        self.duty = duty;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SimShooter {
    target_rps: f64,
    rps: f64,
    target_hood: f64,
    hood: f64,
}

impl SimShooter {
    fn advance(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        self.rps = approach(self.rps, self.target_rps, SHOOTER_ACCELERATION * seconds);
        self.hood = approach(self.hood, self.target_hood, HOOD_SLEW_RATE * seconds);
    }
}

impl Shooter for SimShooter {
    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult {
        debug!(rps, "shooter target set");
        self.target_rps = rps;
        Ok(())
    }

    fn is_at_target_speed(&self) -> SubsystemResult<bool> {
        Ok((self.rps - self.target_rps).abs() <= SHOOTER_TOLERANCE)
    }

    fn set_hood_angle(&mut self, degrees: f64) -> SubsystemResult {
        debug!(degrees, "hood target set");
        self.target_hood = degrees;
        Ok(())
    }

    fn is_hood_at_target_angle(&self) -> SubsystemResult<bool> {
        Ok((self.hood - self.target_hood).abs() <= HOOD_TOLERANCE)
    }
}

/// `None` while the strip shows the alliance colour.
#[derive(Debug, Default)]
struct SimLed {
    colour: Option<LedColour>,
}

impl LedStrip for SimLed {
    fn set_colour(&mut self, colour: LedColour) -> SubsystemResult {
        if self.colour != Some(colour) {
            debug!(%colour, "leds set");
        }
        self.colour = Some(colour);
        Ok(())
    }

    fn set_alliance(&mut self) -> SubsystemResult {
        self.colour = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SimGamepad {
    rumble: [f64; 2],
}

impl Gamepad for SimGamepad {
    fn set_rumble(&mut self, side: Side, intensity: f64) -> SubsystemResult {
        let slot = match side {
            Side::Left => &mut self.rumble[0],
            Side::Right => &mut self.rumble[1],
        };
        *slot = intensity;
        Ok(())
    }
}

/// Whole robot: every mechanism the sequencer can command.
#[derive(Debug)]
pub struct SimulatedRobot {
    drivebase: SimDrivebase,
    location: SimLocation,
    intake: SimIntake,
    velcro: SimMotor,
    conveyor: SimMotor,
    feeders: [SimMotor; 2],
    shooter: SimShooter,
    climbers: [SimMotor; 2],
    led: SimLed,
    gamepad: SimGamepad,
    last_tick: Option<Duration>,
}

impl SimulatedRobot {
    /// Robot at rest with the intake stowed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drivebase: SimDrivebase::default(),
            location: SimLocation::default(),
            intake: SimIntake {
                position: IntakePosition::Retracted,
                travel_left: Duration::ZERO,
                rps: 0.0,
            },
            velcro: SimMotor::new(SubsystemId::Velcro),
            conveyor: SimMotor::new(SubsystemId::Conveyor),
            feeders: [
                SimMotor::new(SubsystemId::FeederLeft),
                SimMotor::new(SubsystemId::FeederRight),
            ],
            shooter: SimShooter::default(),
            climbers: [
                SimMotor::new(SubsystemId::ClimberLeft),
                SimMotor::new(SubsystemId::ClimberRight),
            ],
            led: SimLed::default(),
            gamepad: SimGamepad::default(),
            last_tick: None,
        }
    }

    #[must_use]
    pub fn drive_routine(&self) -> Option<DriveRoutine> {
        self.drivebase.routine
    }

    #[must_use]
    pub fn pose(&self) -> Pose {
        self.location.pose
    }

    #[must_use]
    pub fn intake_position(&self) -> IntakePosition {
        self.intake.position
    }

    #[must_use]
    pub fn intake_rps(&self) -> f64 {
        self.intake.rps
    }

    #[must_use]
    pub fn shooter_rps(&self) -> f64 {
        self.shooter.rps
    }

    #[must_use]
    pub fn hood_angle(&self) -> f64 {
        self.shooter.hood
    }

    /// Current duty cycle of an open-loop motor, `None` for other mechanisms.
    #[must_use]
    pub fn duty_cycle(&self, id: SubsystemId) -> Option<f64> {
        let motor = match id {
            SubsystemId::Velcro => &self.velcro,
            SubsystemId::Conveyor => &self.conveyor,
            SubsystemId::FeederLeft => &self.feeders[0],
            SubsystemId::FeederRight => &self.feeders[1],
            SubsystemId::ClimberLeft => &self.climbers[0],
            SubsystemId::ClimberRight => &self.climbers[1],
            _ => return None,
        };
        Some(motor.duty)
    }

    #[must_use]
    pub fn led_colour(&self) -> Option<LedColour> {
        self.led.colour
    }

    #[must_use]
    pub fn rumble(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.gamepad.rumble[0],
            Side::Right => self.gamepad.rumble[1],
        }
    }
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystems for SimulatedRobot {
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

    fn begin_tick(&mut self, now: Duration) {
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_tick = Some(now);

        self.drivebase.advance(elapsed);
        self.intake.advance(elapsed);
        self.shooter.advance(elapsed);
    }
}
