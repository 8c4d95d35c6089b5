//! Contagion on a two layer contact network.
//!
//! Individuals are susceptible (`S`), exposed (`E`), infectious (`I`), recovered (`R`), tested
//! (`T`) or dead (`D`). Exposed individuals become infectious after a gamma distributed
//! incubation period. Infectious individuals infect members of their households and communities,
//! recover, die or seek a test. Test results return after an exponentially distributed delay.
//!
//! Whether an individual eventually dies, and whether it seeks a test, is decided once and
//! committed for the rest of the run.

use derive_more::Display;
use phf::phf_ordered_map;
use rand::Rng;
use rand::seq::IndexedRandom;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::hazard::GammaHazard;
use crate::config::Parameters;
use crate::core::{Context, Decision, EntityId, EventRecord, Model, Outcome, Population, SimRng};
use crate::errors::{GillespieError, Result};
use crate::network::{ContactNetwork, GroupContext};

/// Parameters of the contagion model and their meaning.
pub static PARAMETERS: phf::OrderedMap<&'static str, &'static str> = phf_ordered_map! {
    "beta" => "transmissivity",
    "prop_time_at_home" => "proportion of time an individual spends at home rather than in the community",
    "sigma_demographic" => "susceptibility by demographic",
    "incubation_scale" => "scale of the gamma distributed incubation period",
    "incubation_shape" => "shape of the gamma distributed incubation period",
    "alpha_recover" => "rate of recovery",
    "alpha_mort" => "rate of removal by death",
    "prob_death" => "probability of death",
    "p_test_0" => "probability of seeking a test while symptomatic",
    "kappa" => "test return rate",
};

#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ContagionState {
    S,
    E,
    I,
    R,
    T,
    D,
}

impl ContagionState {
    pub const ALL: [ContagionState; 6] = [
        ContagionState::S,
        ContagionState::E,
        ContagionState::I,
        ContagionState::R,
        ContagionState::T,
        ContagionState::D,
    ];
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContagionEvent {
    /// End of incubation.
    Progress(EntityId),
    /// Recovery or death of an infectious individual.
    Remove(EntityId, ContagionState),
    /// Contact of an infectious individual with a random member of one of its groups.
    Infect(EntityId),
    SeekTest(EntityId),
    TestResult(EntityId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ContagionParameters {
    beta: f64,
    prop_time_at_home: f64,
    sigma_demographic: f64,
    alpha_recover: f64,
    alpha_mort: f64,
    prob_death: f64,
    p_test_0: f64,
    kappa: f64,
}

impl ContagionParameters {
    fn from_parameters(parameters: &Parameters) -> Result<Self> {
        let rate = |key: &str| {
            let value = parameters.get(key)?;
            match value.is_finite() && value >= 0. {
                true => Ok(value),
                false => Err(GillespieError::InvalidParameter {
                    key: key.to_string(),
                    reason: format!("{value} is not a finite non-negative rate"),
                }),
            }
        };
        let probability = |key: &str| {
            let value = parameters.get(key)?;
            match (0. ..=1.).contains(&value) {
                true => Ok(value),
                false => Err(GillespieError::InvalidParameter {
                    key: key.to_string(),
                    reason: format!("{value} is not a probability"),
                }),
            }
        };

        Ok(Self {
            beta: rate("beta")?,
            prop_time_at_home: probability("prop_time_at_home")?,
            sigma_demographic: probability("sigma_demographic")?,
            alpha_recover: rate("alpha_recover")?,
            alpha_mort: rate("alpha_mort")?,
            prob_death: probability("prob_death")?,
            p_test_0: probability("p_test_0")?,
            kappa: rate("kappa")?,
        })
    }

    fn infectious_rate(&self) -> f64 {
        self.beta + self.alpha_recover + self.alpha_mort + self.kappa
    }
}

/// Uniform thresholds drawn once per individual.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CommittedOutcome {
    death: f64,
    test: f64,
}

pub struct ContagionModel {
    network: ContactNetwork,
    population: Population<ContagionState>,
    parameters: ContagionParameters,
    incubation: GammaHazard,
    test_delay: Exp<f64>,
    outcomes: HashMap<EntityId, CommittedOutcome>,
    entry_time: Vec<f64>,
}

impl ContagionModel {
    pub fn new(
        network: ContactNetwork,
        initial_state: &HashMap<EntityId, ContagionState>,
        parameters: &Parameters,
        initial_time: f64,
    ) -> Result<Self> {
        parameters.check(PARAMETERS.keys().copied())?;
        let population = Population::from_initial_state(network.n_individuals(), initial_state)?;
        let incubation = GammaHazard::new(
            parameters.get("incubation_shape")?,
            parameters.get("incubation_scale")?,
        )?;
        let parameters = ContagionParameters::from_parameters(parameters)?;
        let test_delay = Exp::new(parameters.kappa).map_err(|_err| {
            GillespieError::InvalidParameter {
                key: "kappa".to_string(),
                reason: format!("{} is not a valid rate", parameters.kappa),
            }
        })?;
        let entry_time = vec![initial_time; population.len()];

        Ok(Self {
            network,
            population,
            parameters,
            incubation,
            test_delay,
            outcomes: HashMap::new(),
            entry_time,
        })
    }

    pub fn network(&self) -> &ContactNetwork {
        &self.network
    }

    /// Time at which `entity` entered its current state.
    pub fn entry_time(&self, entity: EntityId) -> Option<f64> {
        self.entry_time.get(entity.index()).copied()
    }

    fn outcome(&mut self, entity: EntityId, rng: &mut SimRng) -> CommittedOutcome {
        *self
            .outcomes
            .entry(entity)
            .or_insert_with(|| CommittedOutcome {
                death: rng.random(),
                test: rng.random(),
            })
    }

    fn is_dying(&mut self, entity: EntityId, rng: &mut SimRng) -> bool {
        self.outcome(entity, rng).death < self.parameters.prob_death
    }

    fn transition(
        &mut self,
        entity: EntityId,
        to: ContagionState,
        time: f64,
    ) -> Result<EventRecord<ContagionState>> {
        let from = self.population.set(entity, to)?;
        self.entry_time[entity.index()] = time;
        Ok(EventRecord::new(entity, from, to))
    }

    fn infect(
        &mut self,
        infector: EntityId,
        context: &mut Context,
    ) -> Result<Outcome<ContagionState, ContagionEvent>> {
        let setting = match context.rng.random::<f64>() < self.parameters.prop_time_at_home {
            true => GroupContext::Household,
            false => GroupContext::Community,
        };
        let Some(&group) = self.network.groups_of(infector, setting).choose(context.rng) else {
            return Ok(Outcome::none());
        };
        let contacts: Vec<EntityId> = self
            .network
            .group(group)
            .map(|group| {
                group
                    .members
                    .iter()
                    .copied()
                    .filter(|&member| member != infector)
                    .collect()
            })
            .unwrap_or_default();
        let Some(&contact) = contacts.choose(context.rng) else {
            return Ok(Outcome::none());
        };

        if self.population[contact] != ContagionState::S
            || context.rng.random::<f64>() >= self.parameters.sigma_demographic
        {
            return Ok(Outcome::none());
        }

        let record = self
            .transition(contact, ContagionState::E, context.time)?
            .with_auxiliary(
                vec![infector],
                self.population[infector].to_string(),
            )
            .with_context(self.network.group_name(group));
        Ok(Outcome::transition(record))
    }
}

impl Model for ContagionModel {
    type State = ContagionState;
    type Event = ContagionEvent;

    fn population(&self) -> &Population<ContagionState> {
        &self.population
    }

    fn tracked_states(&self) -> Vec<ContagionState> {
        ContagionState::ALL.to_vec()
    }

    fn maximal_rate(&mut self, entity: EntityId, context: &mut Context) -> Result<f64> {
        let state = self.population[entity];
        if matches!(state, ContagionState::E | ContagionState::I) {
            self.outcome(entity, context.rng);
        }
        Ok(match state {
            ContagionState::E => self.incubation.bound(),
            ContagionState::I => self.parameters.infectious_rate(),
            ContagionState::S | ContagionState::R | ContagionState::T | ContagionState::D => 0.,
        })
    }

    fn decide(
        &mut self,
        entity: EntityId,
        rate: f64,
        context: &mut Context,
    ) -> Result<Decision<ContagionEvent>> {
        let state = self.population[entity];
        let roll = context.rng.random::<f64>() * rate;

        match state {
            ContagionState::E => {
                let elapsed = context.time - self.entry_time[entity.index()];
                Ok(match roll < self.incubation.hazard(elapsed) {
                    true => Decision::Event(ContagionEvent::Progress(entity)),
                    false => Decision::NoEvent,
                })
            }
            ContagionState::I => {
                let outcome = self.outcome(entity, context.rng);
                let dying = outcome.death < self.parameters.prob_death;
                let testing = outcome.test < self.parameters.p_test_0;
                let p = self.parameters;

                let event = if roll < p.alpha_mort {
                    dying.then_some(ContagionEvent::Remove(entity, ContagionState::D))
                } else if roll < p.alpha_mort + p.kappa {
                    testing.then_some(ContagionEvent::SeekTest(entity))
                } else if roll < p.alpha_mort + p.kappa + p.alpha_recover {
                    (!dying).then_some(ContagionEvent::Remove(entity, ContagionState::R))
                } else {
                    Some(ContagionEvent::Infect(entity))
                };
                Ok(event.map_or(Decision::NoEvent, Decision::Event))
            }
            _ => Err(GillespieError::UnhandledState {
                entity,
                state: state.to_string(),
            }),
        }
    }

    fn apply(
        &mut self,
        event: ContagionEvent,
        context: &mut Context,
    ) -> Result<Outcome<ContagionState, ContagionEvent>> {
        match event {
            ContagionEvent::Progress(entity) => Ok(Outcome::transition(self.transition(
                entity,
                ContagionState::I,
                context.time,
            )?)),
            ContagionEvent::Remove(entity, to) => Ok(Outcome::transition(self.transition(
                entity,
                to,
                context.time,
            )?)),
            ContagionEvent::Infect(infector) => self.infect(infector, context),
            ContagionEvent::SeekTest(entity) => {
                let record = self.transition(entity, ContagionState::T, context.time)?;
                let due = context.time + self.test_delay.sample(context.rng);
                Ok(Outcome::transition(record).schedule(due, ContagionEvent::TestResult(entity)))
            }
            ContagionEvent::TestResult(entity) => {
                if self.population[entity] != ContagionState::T {
                    return Ok(Outcome::none());
                }
                let to = match self.is_dying(entity, context.rng) {
                    true => ContagionState::D,
                    false => ContagionState::R,
                };
                Ok(Outcome::transition(self.transition(
                    entity,
                    to,
                    context.time,
                )?))
            }
        }
    }
}
