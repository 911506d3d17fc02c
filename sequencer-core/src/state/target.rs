//! Target keys and the values a [`State`](super::State) can command.

use core::fmt;

use crate::domain::Domain;

/// Left or right member of a mirrored mechanism pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Intake arm position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntakePosition {
    Extended,
    Retracted,
}

/// Colours available on the indicator strip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColour {
    Red,
    Yellow,
    Blue,
    Green,
    Orange,
    Magenta,
    White,
    Purple,
    Cyan,
    Brown,
}

impl LedColour {
    pub const ALL: [LedColour; 10] = [
        LedColour::Red,
        LedColour::Yellow,
        LedColour::Blue,
        LedColour::Green,
        LedColour::Orange,
        LedColour::Magenta,
        LedColour::White,
        LedColour::Purple,
        LedColour::Cyan,
        LedColour::Brown,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LedColour::Red => "red",
            LedColour::Yellow => "yellow",
            LedColour::Blue => "blue",
            LedColour::Green => "green",
            LedColour::Orange => "orange",
            LedColour::Magenta => "magenta",
            LedColour::White => "white",
            LedColour::Purple => "purple",
            LedColour::Cyan => "cyan",
            LedColour::Brown => "brown",
        }
    }

    /// Case-insensitive lookup by [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|colour| colour.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for LedColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drive routine selected on the drivebase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveRoutineKind {
    ConstantPower,
    ConstantSpeed,
    ArcadeDutyCycle,
    ArcadeClimb,
    Cheesy,
    Trajectory,
    VisionDrive,
    VisionAim,
    VisionAssist,
    TapeAssist,
    TurnToBearing,
    PositionPidArcade,
    ArcadeVelocity,
    DdrPad,
}

impl DriveRoutineKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DriveRoutineKind::ConstantPower => "constant-power",
            DriveRoutineKind::ConstantSpeed => "constant-speed",
            DriveRoutineKind::ArcadeDutyCycle => "arcade-duty-cycle",
            DriveRoutineKind::ArcadeClimb => "arcade-climb",
            DriveRoutineKind::Cheesy => "cheesy",
            DriveRoutineKind::Trajectory => "trajectory",
            DriveRoutineKind::VisionDrive => "vision-drive",
            DriveRoutineKind::VisionAim => "vision-aim",
            DriveRoutineKind::VisionAssist => "vision-assist",
            DriveRoutineKind::TapeAssist => "tape-assist",
            DriveRoutineKind::TurnToBearing => "turn-to-bearing",
            DriveRoutineKind::PositionPidArcade => "position-pid-arcade",
            DriveRoutineKind::ArcadeVelocity => "arcade-velocity",
            DriveRoutineKind::DdrPad => "ddr-pad",
        }
    }

    /// Open-ended routines hand the drivebase to the operator or run
    /// indefinitely, so they report finished as soon as they are installed.
    /// The others run until they reach their goal.
    #[must_use]
    pub const fn is_open_ended(self) -> bool {
        !matches!(
            self,
            DriveRoutineKind::Trajectory
                | DriveRoutineKind::VisionAim
                | DriveRoutineKind::TurnToBearing
                | DriveRoutineKind::PositionPidArcade
        )
    }
}

/// Drive routine request: the routine plus its single tuning value
/// (power, speed or bearing depending on the kind).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriveRoutine {
    pub kind: DriveRoutineKind,
    pub value: f64,
}

impl DriveRoutine {
    #[must_use]
    pub const fn new(kind: DriveRoutineKind) -> Self {
        Self { kind, value: 0.0 }
    }

    #[must_use]
    pub const fn with_value(kind: DriveRoutineKind, value: f64) -> Self {
        Self { kind, value }
    }

    #[must_use]
    pub const fn constant_power(power: f64) -> Self {
        Self::with_value(DriveRoutineKind::ConstantPower, power)
    }

    #[must_use]
    pub const fn constant_speed(speed: f64) -> Self {
        Self::with_value(DriveRoutineKind::ConstantSpeed, speed)
    }

    #[must_use]
    pub const fn turn_to_bearing(degrees: f64) -> Self {
        Self::with_value(DriveRoutineKind::TurnToBearing, degrees)
    }
}

impl fmt::Display for DriveRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DriveRoutineKind::ConstantPower
            | DriveRoutineKind::ConstantSpeed
            | DriveRoutineKind::TurnToBearing => write!(f, "{}({:.2})", self.kind.name(), self.value),
            _ => f.write_str(self.kind.name()),
        }
    }
}

/// Field pose override.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading_degrees: f64,
}

impl Pose {
    #[must_use]
    pub const fn new(x: f64, y: f64, heading_degrees: f64) -> Self {
        Self {
            x,
            y,
            heading_degrees,
        }
    }
}

/// Closed set of keys a state may command, listed in command-pass order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetKey {
    Drive,
    Pose,
    IntakePosition,
    IntakeRps,
    VelcroDutyCycle,
    ConveyorDutyCycle,
    ShooterRps,
    FeederLeft,
    FeederRight,
    HoodAngle,
    LedColour,
    ClimberLeft,
    ClimberRight,
    Rumble,
}

impl TargetKey {
    /// Every key in the order the command pass pushes them.
    pub const ALL: [TargetKey; 14] = [
        TargetKey::Drive,
        TargetKey::Pose,
        TargetKey::IntakePosition,
        TargetKey::IntakeRps,
        TargetKey::VelcroDutyCycle,
        TargetKey::ConveyorDutyCycle,
        TargetKey::ShooterRps,
        TargetKey::FeederLeft,
        TargetKey::FeederRight,
        TargetKey::HoodAngle,
        TargetKey::LedColour,
        TargetKey::ClimberLeft,
        TargetKey::ClimberRight,
        TargetKey::Rumble,
    ];

    /// Domain claimed by commanding this key. Rumble claims none.
    #[must_use]
    pub const fn domain(self) -> Option<Domain> {
        match self {
            TargetKey::Drive | TargetKey::Pose => Some(Domain::Drivebase),
            TargetKey::IntakePosition | TargetKey::IntakeRps | TargetKey::VelcroDutyCycle => {
                Some(Domain::Intake)
            }
            TargetKey::ConveyorDutyCycle => Some(Domain::Conveyor),
            TargetKey::ShooterRps | TargetKey::HoodAngle => Some(Domain::Shooter),
            TargetKey::FeederLeft | TargetKey::FeederRight => Some(Domain::Feeder),
            TargetKey::LedColour => Some(Domain::Led),
            TargetKey::ClimberLeft | TargetKey::ClimberRight => Some(Domain::Climber),
            TargetKey::Rumble => None,
        }
    }

    /// Whether an interrupted sequence settles into this key's last value.
    ///
    /// Drive routines and pose overrides are motion requests, and the LED and
    /// rumble are cosmetic; none of them are replayed by a derived end state.
    #[must_use]
    pub const fn settles_on_interrupt(self) -> bool {
        !matches!(
            self,
            TargetKey::Drive | TargetKey::Pose | TargetKey::LedColour | TargetKey::Rumble
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TargetKey::Drive => "drive",
            TargetKey::Pose => "pose",
            TargetKey::IntakePosition => "intake-position",
            TargetKey::IntakeRps => "intake-rps",
            TargetKey::VelcroDutyCycle => "velcro",
            TargetKey::ConveyorDutyCycle => "conveyor",
            TargetKey::ShooterRps => "shooter-rps",
            TargetKey::FeederLeft => "feeder-left",
            TargetKey::FeederRight => "feeder-right",
            TargetKey::HoodAngle => "hood-angle",
            TargetKey::LedColour => "led",
            TargetKey::ClimberLeft => "climber-left",
            TargetKey::ClimberRight => "climber-right",
            TargetKey::Rumble => "rumble",
        }
    }
}

/// A single commanded value, tagged by its key.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Target {
    Drive(DriveRoutine),
    Pose(Pose),
    IntakePosition(IntakePosition),
    IntakeRps(f64),
    VelcroDutyCycle(f64),
    ConveyorDutyCycle(f64),
    ShooterRps(f64),
    Feeder(Side, f64),
    HoodAngle(f64),
    LedColour(LedColour),
    Climber(Side, f64),
    Rumble(f64),
}

impl Target {
    #[must_use]
    pub const fn key(&self) -> TargetKey {
        match self {
            Target::Drive(_) => TargetKey::Drive,
            Target::Pose(_) => TargetKey::Pose,
            Target::IntakePosition(_) => TargetKey::IntakePosition,
            Target::IntakeRps(_) => TargetKey::IntakeRps,
            Target::VelcroDutyCycle(_) => TargetKey::VelcroDutyCycle,
            Target::ConveyorDutyCycle(_) => TargetKey::ConveyorDutyCycle,
            Target::ShooterRps(_) => TargetKey::ShooterRps,
            Target::Feeder(Side::Left, _) => TargetKey::FeederLeft,
            Target::Feeder(Side::Right, _) => TargetKey::FeederRight,
            Target::HoodAngle(_) => TargetKey::HoodAngle,
            Target::LedColour(_) => TargetKey::LedColour,
            Target::Climber(Side::Left, _) => TargetKey::ClimberLeft,
            Target::Climber(Side::Right, _) => TargetKey::ClimberRight,
            Target::Rumble(_) => TargetKey::Rumble,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key().name();
        match self {
            Target::Drive(routine) => write!(f, "{key}={routine}"),
            Target::Pose(pose) => write!(
                f,
                "{key}=({:.2}, {:.2}, {:.1}deg)",
                pose.x, pose.y, pose.heading_degrees
            ),
            Target::IntakePosition(IntakePosition::Extended) => write!(f, "{key}=extended"),
            Target::IntakePosition(IntakePosition::Retracted) => write!(f, "{key}=retracted"),
            Target::LedColour(colour) => write!(f, "{key}={colour}"),
            Target::IntakeRps(value)
            | Target::VelcroDutyCycle(value)
            | Target::ConveyorDutyCycle(value)
            | Target::ShooterRps(value)
            | Target::Feeder(_, value)
            | Target::HoodAngle(value)
            | Target::Climber(_, value)
            | Target::Rumble(value) => write!(f, "{key}={value:.2}"),
        }
    }
}
