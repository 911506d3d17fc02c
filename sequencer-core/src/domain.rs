//! Mechanism domains and the bit set used for conflict detection.
//!
//! A domain groups mechanisms that may physically interfere with each other.
//! Two sequences conflict exactly when their domain sets intersect, so every
//! decision the controller makes about aborting or deferring a runner reduces
//! to a handful of bit operations on [`DomainSet`].

use core::fmt;

/// Independently controlled mechanism group.
///
/// There is no time domain: two sequences that only differ in
/// their delays never conflict.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Domain {
    Drivebase,
    Intake,
    Conveyor,
    Feeder,
    Shooter,
    Climber,
    Led,
}

impl Domain {
    /// Every domain in index order.
    pub const ALL: [Domain; 7] = [
        Domain::Drivebase,
        Domain::Intake,
        Domain::Conveyor,
        Domain::Feeder,
        Domain::Shooter,
        Domain::Climber,
        Domain::Led,
    ];

    /// Deterministic index used for the bit position inside [`DomainSet`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Domain::Drivebase => 0,
            Domain::Intake => 1,
            Domain::Conveyor => 2,
            Domain::Feeder => 3,
            Domain::Shooter => 4,
            Domain::Climber => 5,
            Domain::Led => 6,
        }
    }

    /// Attempts to construct a [`Domain`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Domain::Drivebase),
            1 => Some(Domain::Intake),
            2 => Some(Domain::Conveyor),
            3 => Some(Domain::Feeder),
            4 => Some(Domain::Shooter),
            5 => Some(Domain::Climber),
            6 => Some(Domain::Led),
            _ => None,
        }
    }

    /// Lower-case label used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Domain::Drivebase => "drivebase",
            Domain::Intake => "intake",
            Domain::Conveyor => "conveyor",
            Domain::Feeder => "feeder",
            Domain::Shooter => "shooter",
            Domain::Climber => "climber",
            Domain::Led => "led",
        }
    }

    const fn bit(self) -> u8 {
        1 << self.as_index()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of [`Domain`]s backed by a single byte.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DomainSet(u8);

impl DomainSet {
    /// Set containing no domains.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing exactly one domain.
    #[must_use]
    pub const fn single(domain: Domain) -> Self {
        Self(domain.bit())
    }

    /// Adds `domain` to the set.
    pub fn insert(&mut self, domain: Domain) {
        self.0 |= domain.bit();
    }

    /// Returns `true` when `domain` is a member.
    #[must_use]
    pub const fn contains(self, domain: Domain) -> bool {
        self.0 & domain.bit() != 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when at least one domain is shared.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the members in index order.
    pub fn iter(self) -> impl Iterator<Item = Domain> {
        Domain::ALL
            .into_iter()
            .filter(move |domain| self.contains(*domain))
    }
}

impl FromIterator<Domain> for DomainSet {
    fn from_iter<I: IntoIterator<Item = Domain>>(iter: I) -> Self {
        let mut set = DomainSet::empty();
        for domain in iter {
            set.insert(domain);
        }
        set
    }
}

impl fmt::Display for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (position, domain) in self.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            f.write_str(domain.name())?;
        }
        f.write_str("}")
    }
}
