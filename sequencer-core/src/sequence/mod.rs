//! Immutable sequences and the single-use builder that assembles them.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use portable_atomic::{AtomicU32, Ordering};

use crate::domain::DomainSet;
use crate::state::State;

static NEXT_SEQUENCE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a built [`Sequence`].
///
/// Two sequences with identical contents still have different ids; the
/// controller deduplicates by id only.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceId(u32);

impl SequenceId {
    fn allocate() -> Self {
        Self(NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named, ordered list of states plus the state applied when aborted.
#[derive(Debug)]
pub struct Sequence {
    id: SequenceId,
    name: &'static str,
    states: Vec<State>,
    end_state: State,
    domains: DomainSet,
}

impl Sequence {
    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// State installed once an aborted sequence's in-flight state converges.
    #[must_use]
    pub fn end_state(&self) -> &State {
        &self.end_state
    }

    /// Union of the domains of every state, the end state included.
    ///
    /// This is wider than the steps alone when an explicit end state touches
    /// a mechanism no step does: such a sequence still conflicts over that
    /// mechanism, so its end state never runs beside another owner of it.
    #[must_use]
    pub fn domains(&self) -> DomainSet {
        self.domains
    }

    /// Two sequences conflict when they touch a common domain.
    #[must_use]
    pub fn conflicts_with(&self, other: &Sequence) -> bool {
        self.domains.intersects(other.domains)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.domains)
    }
}

/// Builds a [`Sequence`] one state at a time.
///
/// ```
/// use sequencer_core::sequence::SequenceBuilder;
///
/// let mut builder = SequenceBuilder::new("start intaking");
/// builder.then().deploy_intake();
/// builder.then().set_intake_rps(10.0).set_conveyor_duty_cycle(0.5);
/// builder.create_interrupt_state();
/// let sequence = builder.build();
/// assert_eq!(sequence.states().len(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceBuilder {
    name: &'static str,
    states: Vec<State>,
    end_state: State,
    derive_end_state: bool,
}

impl SequenceBuilder {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            states: Vec::new(),
            end_state: State::new(),
            derive_end_state: false,
        }
    }

    /// Appends an empty state and returns it for configuration.
    pub fn then(&mut self) -> &mut State {
        self.states.push(State::new());
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    /// Appends a state annotated with `message`.
    pub fn then_logged(&mut self, message: &'static str) -> &mut State {
        self.then().log(message)
    }

    /// Appends copies of `other`'s states. Its end state is not copied.
    pub fn append_sequence(&mut self, other: &Sequence) -> &mut Self {
        self.states.extend(other.states.iter().cloned());
        self
    }

    /// Derives the end state from the states at build time, settling every
    /// mechanism where the sequence would have left it.
    pub fn create_interrupt_state(&mut self) -> &mut Self {
        self.derive_end_state = true;
        self
    }

    /// Explicitly authored end state. Derived values are folded on top.
    pub fn on_interrupt(&mut self) -> &mut State {
        &mut self.end_state
    }

    #[must_use]
    pub fn build(self) -> Arc<Sequence> {
        let end_state = if self.derive_end_state {
            derive_end_state(&self.end_state, &self.states)
        } else {
            self.end_state
        };
        let domains = self
            .states
            .iter()
            .fold(end_state.domains(), |domains, state| {
                domains.union(state.domains())
            });

        Arc::new(Sequence {
            id: SequenceId::allocate(),
            name: self.name,
            states: self.states,
            end_state,
            domains,
        })
    }
}

/// Folds every settling target of `states` over `explicit`, last write wins.
#[must_use]
pub fn derive_end_state(explicit: &State, states: &[State]) -> State {
    states
        .iter()
        .fold(explicit.clone(), |settled, state| settled.settled_with(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::state::{IntakePosition, Target, TargetKey, WaitFor};
    use core::time::Duration;

    fn ramp() -> Arc<Sequence> {
        let mut builder = SequenceBuilder::new("ramp");
        for rps in [20.0, 40.0, 60.0, 80.0, 100.0] {
            builder
                .then()
                .set_shooter_rps(rps)
                .delay_for(Duration::from_millis(500));
        }
        builder.then().deploy_intake();
        builder.create_interrupt_state();
        builder.build()
    }

    #[test]
    fn derived_end_state_keeps_last_written_values() {
        let sequence = ramp();
        let end = sequence.end_state();

        assert_eq!(end.get(TargetKey::ShooterRps), Some(Target::ShooterRps(100.0)));
        assert_eq!(
            end.get(TargetKey::IntakePosition),
            Some(Target::IntakePosition(IntakePosition::Extended))
        );
        assert_eq!(end.get(TargetKey::ConveyorDutyCycle), None);
        assert!(end.waits().is_empty(), "derived end state never waits");
        assert_eq!(end.timed_wait(), None);
    }

    #[test]
    fn explicit_end_state_is_overridden_by_derived_values() {
        let mut builder = SequenceBuilder::new("stop intaking");
        builder.then().set_intake_rps(0.0).set_velcro_duty_cycle(0.0);
        builder.on_interrupt().set_intake_rps(5.0).set_conveyor_duty_cycle(0.0);
        builder.create_interrupt_state();
        let sequence = builder.build();

        let end = sequence.end_state();
        assert_eq!(end.get(TargetKey::IntakeRps), Some(Target::IntakeRps(0.0)));
        assert_eq!(
            end.get(TargetKey::ConveyorDutyCycle),
            Some(Target::ConveyorDutyCycle(0.0))
        );
    }

    #[test]
    fn end_state_is_empty_without_interrupt_request() {
        let mut builder = SequenceBuilder::new("no end state");
        builder.then().set_shooter_rps(50.0);
        let sequence = builder.build();
        assert_eq!(*sequence.end_state(), State::new());
    }

    #[test]
    fn domains_cover_states_and_end_state() {
        let mut builder = SequenceBuilder::new("shoot");
        builder.then().set_conveyor_duty_cycle(1.0);
        builder.then().wait_for_hood();
        builder.on_interrupt().set_climber_duty_cycle(crate::state::Side::Left, 0.0);
        let sequence = builder.build();

        let domains = sequence.domains();
        assert!(domains.contains(Domain::Conveyor));
        assert!(domains.contains(Domain::Shooter));
        assert!(domains.contains(Domain::Climber));
        assert!(!domains.contains(Domain::Drivebase));
    }

    #[test]
    fn end_state_alone_claims_its_mechanism() {
        let mut parking = SequenceBuilder::new("park climber");
        parking.then().set_conveyor_duty_cycle(0.0);
        parking.on_interrupt().set_climber_duty_cycle(crate::state::Side::Left, 0.0);
        let parking = parking.build();

        let mut climb = SequenceBuilder::new("climb");
        climb.then().set_climber_duty_cycle(crate::state::Side::Left, 0.3);
        assert!(parking.conflicts_with(&climb.build()));
    }

    #[test]
    fn empty_sequences_conflict_with_nothing() {
        let empty = SequenceBuilder::new("empty").build();
        assert!(empty.is_empty());
        assert!(!empty.conflicts_with(&empty));
        assert!(!empty.conflicts_with(&ramp()));
    }

    #[test]
    fn identical_builds_get_distinct_ids() {
        let a = SequenceBuilder::new("same").build();
        let b = SequenceBuilder::new("same").build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn append_copies_states_only() {
        let ramp = ramp();
        let mut builder = SequenceBuilder::new("ramp then log");
        builder.append_sequence(&ramp);
        builder.then_logged("done");
        let sequence = builder.build();

        assert_eq!(sequence.states().len(), ramp.states().len() + 1);
        assert_eq!(sequence.states().last().and_then(State::log_message), Some("done"));
        assert_eq!(*sequence.end_state(), State::new());
        assert!(sequence.states()[5].waits().contains(WaitFor::IntakePosition));
    }
}
