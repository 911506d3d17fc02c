//! One step of a sequence: sparse targets, wait conditions, and the domains
//! those targets claim.
//!
//! Every fluent setter on [`State`] records the domain implied by the key it
//! writes, so nothing downstream of this module needs to know which
//! mechanism belongs to which domain.

use core::fmt;
use core::time::Duration;

use crate::domain::DomainSet;

pub mod target;
pub mod wait;

pub use target::{
    DriveRoutine, DriveRoutineKind, IntakePosition, LedColour, Pose, Side, Target, TargetKey,
};
pub use wait::{BlockedBy, TimedWait, WaitFor, WaitSet};

/// Desired targets for one step.
///
/// Absent targets leave the matching subsystem untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State {
    drive: Option<DriveRoutine>,
    pose: Option<Pose>,
    intake_position: Option<IntakePosition>,
    intake_rps: Option<f64>,
    velcro_duty_cycle: Option<f64>,
    conveyor_duty_cycle: Option<f64>,
    shooter_rps: Option<f64>,
    feeder_left: Option<f64>,
    feeder_right: Option<f64>,
    hood_angle: Option<f64>,
    led_colour: Option<LedColour>,
    climber_left: Option<f64>,
    climber_right: Option<f64>,
    rumble: Option<f64>,
    waits: WaitSet,
    timed_wait: Option<TimedWait>,
    log_message: Option<&'static str>,
    domains: DomainSet,
}

impl State {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value commanded for `key`, if any.
    #[must_use]
    pub fn get(&self, key: TargetKey) -> Option<Target> {
        match key {
            TargetKey::Drive => self.drive.map(Target::Drive),
            TargetKey::Pose => self.pose.map(Target::Pose),
            TargetKey::IntakePosition => self.intake_position.map(Target::IntakePosition),
            TargetKey::IntakeRps => self.intake_rps.map(Target::IntakeRps),
            TargetKey::VelcroDutyCycle => self.velcro_duty_cycle.map(Target::VelcroDutyCycle),
            TargetKey::ConveyorDutyCycle => {
                self.conveyor_duty_cycle.map(Target::ConveyorDutyCycle)
            }
            TargetKey::ShooterRps => self.shooter_rps.map(Target::ShooterRps),
            TargetKey::FeederLeft => self.feeder_left.map(|v| Target::Feeder(Side::Left, v)),
            TargetKey::FeederRight => self.feeder_right.map(|v| Target::Feeder(Side::Right, v)),
            TargetKey::HoodAngle => self.hood_angle.map(Target::HoodAngle),
            TargetKey::LedColour => self.led_colour.map(Target::LedColour),
            TargetKey::ClimberLeft => self.climber_left.map(|v| Target::Climber(Side::Left, v)),
            TargetKey::ClimberRight => {
                self.climber_right.map(|v| Target::Climber(Side::Right, v))
            }
            TargetKey::Rumble => self.rumble.map(Target::Rumble),
        }
    }

    /// Writes `target` and claims its domain.
    pub fn set(&mut self, target: Target) -> &mut Self {
        match target {
            Target::Drive(routine) => self.drive = Some(routine),
            Target::Pose(pose) => self.pose = Some(pose),
            Target::IntakePosition(position) => self.intake_position = Some(position),
            Target::IntakeRps(rps) => self.intake_rps = Some(rps),
            Target::VelcroDutyCycle(duty) => self.velcro_duty_cycle = Some(duty),
            Target::ConveyorDutyCycle(duty) => self.conveyor_duty_cycle = Some(duty),
            Target::ShooterRps(rps) => self.shooter_rps = Some(rps),
            Target::Feeder(Side::Left, duty) => self.feeder_left = Some(duty),
            Target::Feeder(Side::Right, duty) => self.feeder_right = Some(duty),
            Target::HoodAngle(degrees) => self.hood_angle = Some(degrees),
            Target::LedColour(colour) => self.led_colour = Some(colour),
            Target::Climber(Side::Left, duty) => self.climber_left = Some(duty),
            Target::Climber(Side::Right, duty) => self.climber_right = Some(duty),
            Target::Rumble(intensity) => self.rumble = Some(intensity),
        }
        if let Some(domain) = target.key().domain() {
            self.domains.insert(domain);
        }
        self
    }

    /// Iterates the present targets in command-pass order.
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        TargetKey::ALL.into_iter().filter_map(|key| self.get(key))
    }

    /// Requires `wait` to hold before the state completes.
    pub fn wait_for(&mut self, wait: WaitFor) -> &mut Self {
        self.waits.insert(wait);
        self
    }

    pub fn set_drive_routine(&mut self, routine: DriveRoutine) -> &mut Self {
        self.set(Target::Drive(routine)).wait_for(WaitFor::DriveFinished)
    }

    pub fn set_drivebase_power(&mut self, power: f64) -> &mut Self {
        self.set_drive_routine(DriveRoutine::constant_power(power))
    }

    pub fn set_drivebase_speed(&mut self, speed: f64) -> &mut Self {
        self.set_drive_routine(DriveRoutine::constant_speed(speed))
    }

    pub fn turn_to_bearing(&mut self, degrees: f64) -> &mut Self {
        self.set_drive_routine(DriveRoutine::turn_to_bearing(degrees))
    }

    pub fn set_current_pose(&mut self, pose: Pose) -> &mut Self {
        self.set(Target::Pose(pose))
    }

    /// Extends the intake and waits for it to reach position.
    pub fn deploy_intake(&mut self) -> &mut Self {
        self.set(Target::IntakePosition(IntakePosition::Extended))
            .wait_for(WaitFor::IntakePosition)
    }

    /// Retracts the intake and waits for it to reach position.
    pub fn stow_intake(&mut self) -> &mut Self {
        self.set(Target::IntakePosition(IntakePosition::Retracted))
            .wait_for(WaitFor::IntakePosition)
    }

    pub fn set_intake_rps(&mut self, rps: f64) -> &mut Self {
        self.set(Target::IntakeRps(rps))
    }

    pub fn set_velcro_duty_cycle(&mut self, duty: f64) -> &mut Self {
        self.set(Target::VelcroDutyCycle(duty))
    }

    pub fn set_conveyor_duty_cycle(&mut self, duty: f64) -> &mut Self {
        self.set(Target::ConveyorDutyCycle(duty))
    }

    pub fn set_shooter_rps(&mut self, rps: f64) -> &mut Self {
        self.set(Target::ShooterRps(rps))
    }

    pub fn set_hood_angle(&mut self, degrees: f64) -> &mut Self {
        self.set(Target::HoodAngle(degrees))
    }

    /// Waits for the shooter wheel to reach its target speed.
    pub fn wait_for_shooter(&mut self) -> &mut Self {
        self.domains.insert(crate::domain::Domain::Shooter);
        self.wait_for(WaitFor::ShooterSpeed)
    }

    /// Waits for the hood to reach its target angle.
    pub fn wait_for_hood(&mut self) -> &mut Self {
        self.domains.insert(crate::domain::Domain::Shooter);
        self.wait_for(WaitFor::HoodAngle)
    }

    pub fn set_feeder_duty_cycle(&mut self, side: Side, duty: f64) -> &mut Self {
        self.set(Target::Feeder(side, duty))
    }

    pub fn set_climber_duty_cycle(&mut self, side: Side, duty: f64) -> &mut Self {
        self.set(Target::Climber(side, duty))
    }

    pub fn set_led_colour(&mut self, colour: LedColour) -> &mut Self {
        self.set(Target::LedColour(colour))
    }

    /// Rumbles both sides of the operator gamepad. Claims no domain.
    pub fn set_rumble(&mut self, intensity: f64) -> &mut Self {
        self.set(Target::Rumble(intensity))
    }

    /// Holds the state until the controller clock reaches `time`.
    pub fn delay_until(&mut self, time: Duration) -> &mut Self {
        self.timed_wait = Some(TimedWait::Until(time));
        self
    }

    /// Holds the state for `delay` after it becomes current.
    pub fn delay_for(&mut self, delay: Duration) -> &mut Self {
        self.timed_wait = Some(TimedWait::For(delay));
        self
    }

    pub fn log(&mut self, message: &'static str) -> &mut Self {
        self.log_message = Some(message);
        self
    }

    #[must_use]
    pub fn domains(&self) -> DomainSet {
        self.domains
    }

    #[must_use]
    pub fn waits(&self) -> WaitSet {
        self.waits
    }

    #[must_use]
    pub fn timed_wait(&self) -> Option<TimedWait> {
        self.timed_wait
    }

    #[must_use]
    pub fn log_message(&self) -> Option<&'static str> {
        self.log_message
    }

    /// A state with nothing to command or wait for completes on its first apply.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.targets().next().is_none() && self.waits.is_empty() && self.timed_wait.is_none()
    }

    /// Returns a copy of `self` overwritten with every settling target of
    /// `later`. Waits, delays, and log messages are not carried over.
    #[must_use]
    pub fn settled_with(&self, later: &State) -> State {
        let mut next = self.clone();
        for target in later
            .targets()
            .filter(|target| target.key().settles_on_interrupt())
        {
            next.set(target);
        }
        next
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        let mut first = true;
        for target in self.targets() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{target}")?;
        }
        for wait in self.waits.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "wait={}", wait.blocked_by())?;
        }
        match self.timed_wait {
            Some(TimedWait::For(delay)) => {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "delay={}ms", delay.as_millis())?;
            }
            Some(TimedWait::Until(time)) => {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "until={}ms", time.as_millis())?;
            }
            None => {}
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn setters_claim_their_domains() {
        let mut state = State::new();
        state
            .set_intake_rps(10.0)
            .set_conveyor_duty_cycle(0.5)
            .set_rumble(0.75);

        let domains = state.domains();
        assert!(domains.contains(Domain::Intake));
        assert!(domains.contains(Domain::Conveyor));
        assert_eq!(domains.len(), 2, "rumble claims no domain");
    }

    #[test]
    fn explicit_waits_claim_the_shooter() {
        let mut state = State::new();
        state.wait_for_hood();
        assert_eq!(state.domains(), DomainSet::single(Domain::Shooter));
        assert!(state.waits().contains(WaitFor::HoodAngle));
        assert!(!state.waits().contains(WaitFor::ShooterSpeed));
    }

    #[test]
    fn intake_and_drive_targets_wait_implicitly() {
        let mut state = State::new();
        state.deploy_intake().set_drivebase_power(0.22);

        let waits: Vec<_> = state.waits().iter().collect();
        assert_eq!(waits, [WaitFor::IntakePosition, WaitFor::DriveFinished]);
    }

    #[test]
    fn targets_iterate_in_command_order() {
        let mut state = State::new();
        state
            .set_rumble(0.5)
            .set_led_colour(LedColour::Green)
            .set_shooter_rps(80.0)
            .set_drivebase_power(0.1);

        let keys: Vec<_> = state.targets().map(|target| target.key()).collect();
        assert_eq!(
            keys,
            [
                TargetKey::Drive,
                TargetKey::ShooterRps,
                TargetKey::LedColour,
                TargetKey::Rumble
            ]
        );
    }

    #[test]
    fn last_delay_wins() {
        let mut state = State::new();
        state
            .delay_until(Duration::from_secs(3))
            .delay_for(Duration::from_millis(500));
        assert_eq!(
            state.timed_wait(),
            Some(TimedWait::For(Duration::from_millis(500)))
        );
    }

    #[test]
    fn empty_state_is_trivial() {
        assert!(State::new().is_trivial());

        let mut logged = State::new();
        logged.log("annotation only");
        assert!(logged.is_trivial());

        let mut waiting = State::new();
        waiting.delay_for(Duration::from_millis(1));
        assert!(!waiting.is_trivial());
    }

    #[test]
    fn settling_skips_motion_and_cosmetic_keys() {
        let mut later = State::new();
        later
            .set_drivebase_power(0.5)
            .set_led_colour(LedColour::Red)
            .set_rumble(1.0)
            .set_intake_rps(4.0)
            .wait_for_shooter()
            .delay_for(Duration::from_secs(1));

        let settled = State::new().settled_with(&later);
        let targets: Vec<_> = settled.targets().collect();
        assert_eq!(targets, [Target::IntakeRps(4.0)]);
        assert!(settled.waits().is_empty());
        assert_eq!(settled.timed_wait(), None);
        assert_eq!(settled.domains(), DomainSet::single(Domain::Intake));
    }

    #[test]
    fn display_renders_targets_and_waits() {
        let mut state = State::new();
        state
            .set_shooter_rps(90.0)
            .wait_for_shooter()
            .delay_for(Duration::from_millis(250));
        assert_eq!(
            state.to_string(),
            "[shooter-rps=90.00, wait=shooter wheel, delay=250ms]"
        );
    }
}
