//! Capability traits the scheduler drives.
//!
//! The runner only ever talks to mechanisms through these traits, so the
//! same runner code drives real hardware, the emulator's simulated robot and
//! the recording mocks used in tests. Every command is fallible; a returned
//! [`SubsystemFault`] terminates the runner that issued it.

use alloc::boxed::Box;
use core::fmt;
use core::time::Duration;

use crate::state::{DriveRoutine, IntakePosition, LedColour, Pose, Side};

/// Mechanism that reported a fault.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubsystemId {
    Drivebase,
    Location,
    Intake,
    Velcro,
    Conveyor,
    FeederLeft,
    FeederRight,
    Shooter,
    ClimberLeft,
    ClimberRight,
    LedStrip,
    Gamepad,
}

impl SubsystemId {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SubsystemId::Drivebase => "drivebase",
            SubsystemId::Location => "location",
            SubsystemId::Intake => "intake",
            SubsystemId::Velcro => "velcro",
            SubsystemId::Conveyor => "conveyor",
            SubsystemId::FeederLeft => "feeder-left",
            SubsystemId::FeederRight => "feeder-right",
            SubsystemId::Shooter => "shooter",
            SubsystemId::ClimberLeft => "climber-left",
            SubsystemId::ClimberRight => "climber-right",
            SubsystemId::LedStrip => "led-strip",
            SubsystemId::Gamepad => "gamepad",
        }
    }

    #[must_use]
    pub const fn feeder(side: Side) -> Self {
        match side {
            Side::Left => SubsystemId::FeederLeft,
            Side::Right => SubsystemId::FeederRight,
        }
    }

    #[must_use]
    pub const fn climber(side: Side) -> Self {
        match side {
            Side::Left => SubsystemId::ClimberLeft,
            Side::Right => SubsystemId::ClimberRight,
        }
    }
}

/// Hardware (or simulated hardware) failure surfaced by a subsystem call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubsystemFault {
    pub subsystem: SubsystemId,
    pub reason: &'static str,
}

impl SubsystemFault {
    #[must_use]
    pub const fn new(subsystem: SubsystemId, reason: &'static str) -> Self {
        Self { subsystem, reason }
    }
}

impl fmt::Display for SubsystemFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subsystem.name(), self.reason)
    }
}

pub type SubsystemResult<T = ()> = Result<T, SubsystemFault>;

pub trait Drivebase {
    /// Installs `routine`, replacing whatever routine was active.
    fn set_drive_routine(&mut self, routine: DriveRoutine) -> SubsystemResult;

    /// Whether the installed routine has reached its goal.
    fn has_finished(&self) -> SubsystemResult<bool>;
}

pub trait Location {
    fn set_current_pose(&mut self, pose: Pose) -> SubsystemResult;
}

pub trait Intake {
    fn set_position(&mut self, position: IntakePosition) -> SubsystemResult;

    /// Whether the arm has reached the last commanded position.
    fn is_in_position(&self) -> SubsystemResult<bool>;

    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult;
}

/// Open-loop motor driven by duty cycle: velcro roller, conveyor, feeders and climbers.
pub trait DutyCycle {
    fn set_duty_cycle(&mut self, duty: f64) -> SubsystemResult;
}

pub trait Shooter {
    fn set_target_rps(&mut self, rps: f64) -> SubsystemResult;

    fn is_at_target_speed(&self) -> SubsystemResult<bool>;

    fn set_hood_angle(&mut self, degrees: f64) -> SubsystemResult;

    fn is_hood_at_target_angle(&self) -> SubsystemResult<bool>;
}

pub trait LedStrip {
    fn set_colour(&mut self, colour: LedColour) -> SubsystemResult;

    /// Restores the strip to the alliance colour.
    fn set_alliance(&mut self) -> SubsystemResult;
}

pub trait Gamepad {
    fn set_rumble(&mut self, side: Side, intensity: f64) -> SubsystemResult;
}

/// Hands out every mechanism the scheduler may command.
pub trait Subsystems {
    fn drivebase(&mut self) -> &mut dyn Drivebase;
    fn location(&mut self) -> &mut dyn Location;
    fn intake(&mut self) -> &mut dyn Intake;
    fn velcro(&mut self) -> &mut dyn DutyCycle;
    fn conveyor(&mut self) -> &mut dyn DutyCycle;
    fn feeder(&mut self, side: Side) -> &mut dyn DutyCycle;
    fn shooter(&mut self) -> &mut dyn Shooter;
    fn climber(&mut self, side: Side) -> &mut dyn DutyCycle;
    fn led_strip(&mut self) -> &mut dyn LedStrip;
    fn gamepad(&mut self) -> &mut dyn Gamepad;

    /// Called by the controller at the start of every tick, before any runner.
    fn begin_tick(&mut self, _now: Duration) {}
}

/// Mechanism that accepts every command and has always converged.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopMechanism;

impl Drivebase for NoopMechanism {
    fn set_drive_routine(&mut self, _: DriveRoutine) -> SubsystemResult {
        Ok(())
    }

    fn has_finished(&self) -> SubsystemResult<bool> {
        Ok(true)
    }
}

impl Location for NoopMechanism {
    fn set_current_pose(&mut self, _: Pose) -> SubsystemResult {
        Ok(())
    }
}

impl Intake for NoopMechanism {
    fn set_position(&mut self, _: IntakePosition) -> SubsystemResult {
        Ok(())
    }

    fn is_in_position(&self) -> SubsystemResult<bool> {
        Ok(true)
    }

    fn set_target_rps(&mut self, _: f64) -> SubsystemResult {
        Ok(())
    }
}

impl DutyCycle for NoopMechanism {
    fn set_duty_cycle(&mut self, _: f64) -> SubsystemResult {
        Ok(())
    }
}

impl Shooter for NoopMechanism {
    fn set_target_rps(&mut self, _: f64) -> SubsystemResult {
        Ok(())
    }

    fn is_at_target_speed(&self) -> SubsystemResult<bool> {
        Ok(true)
    }

    fn set_hood_angle(&mut self, _: f64) -> SubsystemResult {
        Ok(())
    }

    fn is_hood_at_target_angle(&self) -> SubsystemResult<bool> {
        Ok(true)
    }
}

impl LedStrip for NoopMechanism {
    fn set_colour(&mut self, _: LedColour) -> SubsystemResult {
        Ok(())
    }

    fn set_alliance(&mut self) -> SubsystemResult {
        Ok(())
    }
}

impl Gamepad for NoopMechanism {
    fn set_rumble(&mut self, _: Side, _: f64) -> SubsystemResult {
        Ok(())
    }
}

/// Robot whose mechanisms are all [`NoopMechanism`]s.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSubsystems {
    mechanism: NoopMechanism,
}

impl NoopSubsystems {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mechanism: NoopMechanism,
        }
    }
}

impl Subsystems for NoopSubsystems {
    fn drivebase(&mut self) -> &mut dyn Drivebase {
        &mut self.mechanism
    }

    fn location(&mut self) -> &mut dyn Location {
        &mut self.mechanism
    }

    fn intake(&mut self) -> &mut dyn Intake {
        &mut self.mechanism
    }

    fn velcro(&mut self) -> &mut dyn DutyCycle {
        &mut self.mechanism
    }

    fn conveyor(&mut self) -> &mut dyn DutyCycle {
        &mut self.mechanism
    }

    fn feeder(&mut self, _: Side) -> &mut dyn DutyCycle {
        &mut self.mechanism
    }

    fn shooter(&mut self) -> &mut dyn Shooter {
        &mut self.mechanism
    }

    fn climber(&mut self, _: Side) -> &mut dyn DutyCycle {
        &mut self.mechanism
    }

    fn led_strip(&mut self) -> &mut dyn LedStrip {
        &mut self.mechanism
    }

    fn gamepad(&mut self) -> &mut dyn Gamepad {
        &mut self.mechanism
    }
}

impl<S: Subsystems + ?Sized> Subsystems for Box<S> {
    fn drivebase(&mut self) -> &mut dyn Drivebase {
        (**self).drivebase()
    }

    fn location(&mut self) -> &mut dyn Location {
        (**self).location()
    }

    fn intake(&mut self) -> &mut dyn Intake {
        (**self).intake()
    }

    fn velcro(&mut self) -> &mut dyn DutyCycle {
        (**self).velcro()
    }

    fn conveyor(&mut self) -> &mut dyn DutyCycle {
        (**self).conveyor()
    }

    fn feeder(&mut self, side: Side) -> &mut dyn DutyCycle {
        (**self).feeder(side)
    }

    fn shooter(&mut self) -> &mut dyn Shooter {
        (**self).shooter()
    }

    fn climber(&mut self, side: Side) -> &mut dyn DutyCycle {
        (**self).climber(side)
    }

    fn led_strip(&mut self) -> &mut dyn LedStrip {
        (**self).led_strip()
    }

    fn gamepad(&mut self) -> &mut dyn Gamepad {
        (**self).gamepad()
    }

    fn begin_tick(&mut self, now: Duration) {
        (**self).begin_tick(now);
    }
}
