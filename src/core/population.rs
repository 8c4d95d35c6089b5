//! Population module
//!
//! The population holds the current discrete state of every entity. Entities are dense indices,
//! such that the population is a plain vector of states. A population can only be constructed
//! from an initial state that covers every entity.
//!

use itertools::Itertools;
use std::collections::HashMap;
use std::ops::Index;

use crate::core::{EntityId, StateLabel};
use crate::errors::{GillespieError, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Population<S> {
    states: Vec<S>,
}

impl<S: StateLabel> Index<EntityId> for Population<S> {
    type Output = S;

    fn index(&self, entity: EntityId) -> &Self::Output {
        &self.states[entity.index()]
    }
}

impl<S: StateLabel> FromIterator<S> for Population<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

impl<S: StateLabel> Population<S> {
    /// Construct a population of `size` entities from an initial state mapping.
    ///
    /// Fails with the complete list of entities that have no initial state.
    pub fn from_initial_state(size: usize, initial_state: &HashMap<EntityId, S>) -> Result<Self> {
        let missing: Vec<EntityId> = (0..size)
            .map(EntityId)
            .filter(|entity| !initial_state.contains_key(entity))
            .collect();
        if !missing.is_empty() {
            return Err(GillespieError::MissingInitialState(missing));
        }

        let foreign = initial_state
            .keys()
            .filter(|entity| entity.index() >= size)
            .count();
        if foreign > 0 {
            log::warn!("Ignoring initial state of {foreign} entities outside the population.");
        }

        Ok((0..size)
            .map(|index| initial_state[&EntityId(index)])
            .collect())
    }

    /// Construct a population with every entity in `state`.
    pub fn uniform(size: usize, state: S) -> Self {
        Self {
            states: vec![state; size],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, entity: EntityId) -> Option<S> {
        self.states.get(entity.index()).copied()
    }

    /// Set the state of `entity` and return its previous state.
    pub fn set(&mut self, entity: EntityId, state: S) -> Result<S> {
        let slot = self.states.get_mut(entity.index()).ok_or_else(|| {
            GillespieError::ImplementationError(format!("No entity with index {entity}"))
        })?;
        Ok(std::mem::replace(slot, state))
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + use<S> {
        (0..self.states.len()).map(EntityId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, S)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(index, &state)| (EntityId(index), state))
    }

    /// Count the entities in each state.
    pub fn census(&self) -> HashMap<S, usize> {
        self.states.iter().copied().counts()
    }

    /// Collect all entities in `state`.
    pub fn select(&self, state: S) -> Vec<EntityId> {
        self.iter()
            .filter(|(_, s)| *s == state)
            .map(|(entity, _)| entity)
            .collect()
    }
}
