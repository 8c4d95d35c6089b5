//! The model abstraction.
//!
//! A model supplies the entity specific semantics of a simulation. The driver only ever talks to
//! a model through three operations:
//!
//! 1. `maximal_rate`: An upper bound on the instantaneous event rate of an entity.
//! 2. `decide`: Given that an entity was drawn as a candidate at the current time, decide which
//!    event actually happens, if any.
//! 3. `apply`: Execute an event, report the state changes for the history, which entities need
//!    their rates refreshed and which deterministic events follow from it.
//!
//! Any error returned by a model is passed to the caller of the driver unchanged.

use smallvec::SmallVec;
use std::fmt;
use std::hash::Hash;

use crate::core::history::EventRecord;
use crate::core::{EntityId, Population, SimRng};
use crate::errors::Result;

/// Discrete state of an entity.
///
/// States are plain tagged variants; their declaration order gives the total order.
pub trait StateLabel: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display {}

impl<T> StateLabel for T where T: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display {}

/// Entities whose maximal rate needs to be recomputed after an event.
pub type InfluenceSet = SmallVec<[EntityId; 4]>;

/// Current time and random source handed to a model.
pub struct Context<'a> {
    pub time: f64,
    pub rng: &'a mut SimRng,
}

impl<'a> Context<'a> {
    pub fn new(time: f64, rng: &'a mut SimRng) -> Self {
        Self { time, rng }
    }
}

/// The outcome of a thinning candidate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Decision<E> {
    /// The candidate time fired, but the true rate did not warrant an event.
    NoEvent,
    Event(E),
}

/// Effects of an applied event.
#[derive(Clone, Debug)]
pub struct Outcome<S, E> {
    pub records: Vec<EventRecord<S>>,
    pub influenced: InfluenceSet,
    /// Deterministic events with their due times.
    pub scheduled: Vec<(f64, E)>,
}

impl<S, E> Default for Outcome<S, E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            influenced: InfluenceSet::new(),
            scheduled: Vec::new(),
        }
    }
}

impl<S, E> Outcome<S, E> {
    /// An event that changed nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single state change of `record.entity`, which is also the only influenced entity.
    pub fn transition(record: EventRecord<S>) -> Self {
        let entity = record.entity;
        Self {
            records: vec![record],
            influenced: smallvec::smallvec![entity],
            scheduled: Vec::new(),
        }
    }

    pub fn schedule(mut self, due: f64, event: E) -> Self {
        self.scheduled.push((due, event));
        self
    }

    pub fn influence(mut self, entity: EntityId) -> Self {
        if !self.influenced.contains(&entity) {
            self.influenced.push(entity);
        }
        self
    }
}

pub trait Model {
    type State: StateLabel;
    type Event: fmt::Debug;

    /// The population of entities and their current states.
    fn population(&self) -> &Population<Self::State>;

    /// States whose counts are tracked in the history.
    fn tracked_states(&self) -> Vec<Self::State>;

    /// Upper bound of the event rate of `entity` given the current global state.
    fn maximal_rate(&mut self, entity: EntityId, context: &mut Context) -> Result<f64>;

    /// Decide the actual event of the candidate `entity`, whose maximal rate is `rate`.
    fn decide(
        &mut self,
        entity: EntityId,
        rate: f64,
        context: &mut Context,
    ) -> Result<Decision<Self::Event>>;

    /// Apply `event` to the model state.
    fn apply(
        &mut self,
        event: Self::Event,
        context: &mut Context,
    ) -> Result<Outcome<Self::State, Self::Event>>;
}
