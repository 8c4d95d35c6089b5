//! Rate sampler
//!
//! The rate sampler stores one maximal event rate per active entity and draws entities with
//! probability proportional to their rate. Entities that share an identical rate are kept in a
//! common weight class, such that a draw first selects a class by its share of the total weight
//! and then an entity uniformly within the class. This is efficient as long as the number of
//! distinct rates is small, which is the common case for compartment models.
//!

use rand::prelude::*;
use rand_distr::Exp;
use std::collections::HashMap;

use crate::core::{EntityId, SimRng};
use crate::errors::{GillespieError, Result};

/// Total weights at or below this value count as exhausted.
pub const ACTIVITY_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug)]
struct WeightClass {
    rate: f64,
    members: Vec<EntityId>,
}

impl WeightClass {
    #[inline]
    fn weight(&self) -> f64 {
        self.rate * self.members.len() as f64
    }
}

/// Location of an entity inside the class table.
#[derive(Clone, Copy, Debug)]
struct Slot {
    class: usize,
    position: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RateSampler {
    classes: Vec<WeightClass>,
    class_index: HashMap<u64, usize>,
    slots: HashMap<EntityId, Slot>,
    total_weight: f64,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximal rate of `entity`, replacing any previous rate.
    ///
    /// A rate of zero removes the entity. Negative or NaN rates are rejected.
    pub fn upsert(&mut self, entity: EntityId, rate: f64) -> Result<()> {
        if rate.is_nan() || rate < 0. || rate.is_infinite() {
            return Err(GillespieError::InvalidRate { entity, rate });
        }

        self.remove(entity);
        if rate == 0. {
            return Ok(());
        }

        let class = match self.class_index.get(&rate.to_bits()) {
            Some(&class) => class,
            None => {
                self.classes.push(WeightClass {
                    rate,
                    members: Vec::new(),
                });
                let class = self.classes.len() - 1;
                self.class_index.insert(rate.to_bits(), class);
                class
            }
        };

        let members = &mut self.classes[class].members;
        members.push(entity);
        self.slots.insert(
            entity,
            Slot {
                class,
                position: members.len() - 1,
            },
        );
        self.total_weight += rate;
        Ok(())
    }

    /// Remove `entity` and return its rate, if present.
    ///
    /// Emptied weight classes are kept; only aggregate weights matter for sampling.
    pub fn remove(&mut self, entity: EntityId) -> Option<f64> {
        let slot = self.slots.remove(&entity)?;
        let class = &mut self.classes[slot.class];
        class.members.swap_remove(slot.position);
        if let Some(&moved) = class.members.get(slot.position) {
            if let Some(moved_slot) = self.slots.get_mut(&moved) {
                moved_slot.position = slot.position;
            }
        }
        let rate = class.rate;

        if self.slots.is_empty() {
            // drop accumulated rounding noise once nothing is left
            self.total_weight = 0.;
        } else {
            self.total_weight -= rate;
        }
        Some(rate)
    }

    /// Draw an entity with probability `rate / total_weight`.
    ///
    /// Returns `None` if the sampler is empty.
    pub fn choose_random(&self, rng: &mut SimRng) -> Option<EntityId> {
        if self.slots.is_empty() {
            return None;
        }

        let class_total: f64 = self.classes.iter().map(WeightClass::weight).sum();
        let mut target = rng.random::<f64>() * class_total;

        let mut chosen = None;
        for class in self.classes.iter().filter(|class| !class.members.is_empty()) {
            chosen = Some(class);
            let weight = class.weight();
            if target < weight {
                break;
            }
            target -= weight;
        }

        // falls through to the last non-empty class on rounding overshoot
        chosen.and_then(|class| class.members.choose(rng).copied())
    }

    /// Draw and remove an entity.
    pub fn random_removal(&mut self, rng: &mut SimRng) -> Option<EntityId> {
        let entity = self.choose_random(rng)?;
        self.remove(entity);
        Some(entity)
    }

    /// Draw the delay to the next candidate event of the whole population.
    ///
    /// Delays are exponentially distributed with the total weight as rate, and infinite when the
    /// sampler is exhausted.
    pub fn time_to_next_candidate(&self, rng: &mut SimRng) -> f64 {
        if !self.is_active() {
            return f64::INFINITY;
        }
        match Exp::new(self.total_weight) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => f64::INFINITY,
        }
    }

    /// Check whether any weight is left, ignoring floating point drift.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.total_weight > ACTIVITY_EPSILON
    }

    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Get the current maximal rate of `entity`.
    pub fn rate(&self, entity: EntityId) -> Option<f64> {
        self.slots
            .get(&entity)
            .map(|slot| self.classes[slot.class].rate)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.slots.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Display for RateSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateSampler(items={},total_weight={})",
            self.len(),
            self.total_weight
        )
    }
}
