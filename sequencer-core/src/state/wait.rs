//! Convergence predicates, timed waits, and blocking causes.

use core::fmt;
use core::time::Duration;

use super::target::LedColour;

/// External predicate a state must see satisfied before it completes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitFor {
    IntakePosition,
    ShooterSpeed,
    HoodAngle,
    DriveFinished,
}

impl WaitFor {
    /// Predicates in the order the convergence pass checks them.
    pub const ALL: [WaitFor; 4] = [
        WaitFor::IntakePosition,
        WaitFor::ShooterSpeed,
        WaitFor::HoodAngle,
        WaitFor::DriveFinished,
    ];

    const fn bit(self) -> u8 {
        match self {
            WaitFor::IntakePosition => 1 << 0,
            WaitFor::ShooterSpeed => 1 << 1,
            WaitFor::HoodAngle => 1 << 2,
            WaitFor::DriveFinished => 1 << 3,
        }
    }

    /// Blocking cause reported while this predicate is unmet.
    #[must_use]
    pub const fn blocked_by(self) -> BlockedBy {
        match self {
            WaitFor::IntakePosition => BlockedBy::Intake,
            WaitFor::ShooterSpeed => BlockedBy::ShooterWheel,
            WaitFor::HoodAngle => BlockedBy::ShooterHood,
            WaitFor::DriveFinished => BlockedBy::Driving,
        }
    }
}

/// Set of [`WaitFor`] predicates.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct WaitSet(u8);

impl WaitSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, wait: WaitFor) {
        self.0 |= wait.bit();
    }

    #[must_use]
    pub const fn contains(self, wait: WaitFor) -> bool {
        self.0 & wait.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the members in convergence-pass order.
    pub fn iter(self) -> impl Iterator<Item = WaitFor> {
        WaitFor::ALL
            .into_iter()
            .filter(move |wait| self.contains(*wait))
    }
}

/// Delay applied after every predicate of a state holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimedWait {
    /// Hold until the controller clock reaches this absolute time.
    Until(Duration),
    /// Hold for this long after the state became current.
    For(Duration),
}

impl TimedWait {
    /// Controller time at which the wait expires for a state activated at `started_at`.
    #[must_use]
    pub fn ends_at(self, started_at: Duration) -> Duration {
        match self {
            TimedWait::Until(deadline) => deadline,
            TimedWait::For(delay) => started_at.saturating_add(delay),
        }
    }
}

/// Reason a runner cannot leave its current state yet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockedBy {
    Intake,
    ShooterWheel,
    ShooterHood,
    Driving,
    Time,
}

impl BlockedBy {
    /// Diagnostic label published for dashboards.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BlockedBy::Intake => "intake",
            BlockedBy::ShooterWheel => "shooter wheel",
            BlockedBy::ShooterHood => "shooter hood",
            BlockedBy::Driving => "driving",
            BlockedBy::Time => "time",
        }
    }

    /// Colour shown on the LED strip while blocked.
    #[must_use]
    pub const fn attention_colour(self) -> LedColour {
        match self {
            BlockedBy::Intake => LedColour::Yellow,
            BlockedBy::ShooterWheel => LedColour::Purple,
            BlockedBy::ShooterHood => LedColour::Magenta,
            BlockedBy::Driving => LedColour::Cyan,
            BlockedBy::Time => LedColour::Orange,
        }
    }
}

impl fmt::Display for BlockedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
