//! The simulation driver.
//!
//! A `Simulation` runs the Gillespie-Max algorithm over a `Model`. Candidate event times are
//! drawn from the sum of the maximal rates of all entities. Before a candidate time is accepted,
//! all scheduled events due earlier are executed. A candidate is then assigned to an entity with
//! probability proportional to its maximal rate, and the model decides whether the candidate
//! turns into a real event (thinning).
//!
//! The driver exclusively owns the sampler, the queue, the history and the random source of a
//! run, so independent runs share no mutable state.

use derive_more::Display;
use rand::SeedableRng;

use crate::core::{
    Context, Decision, EntityId, EventQueue, HistoryRecorder, HistoryTable, Model, RateSampler,
    SimRng,
};
use crate::errors::{GillespieError, Result};
use crate::readwrite::{Attributes, HistoryWriter};

/// Reason a run ended.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Termination {
    /// No rate is left and no event is scheduled.
    #[display("natural_exhaustion")]
    NaturalExhaustion,
    /// The clock crossed the horizon.
    #[display("horizon_reached")]
    HorizonReached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Finished(Termination),
}

/// Non-fatal anomalies met during a run.
#[derive(Clone, Debug, Display, PartialEq)]
pub enum Diagnostic {
    /// A scheduled event was due before the clock and has been discarded.
    #[display("StaleEvent(due={due},now={now})")]
    StaleEvent { due: f64, now: f64 },
}

pub struct Simulation<M: Model> {
    model: M,
    time: f64,
    rates: RateSampler,
    queue: EventQueue<M::Event>,
    history: HistoryRecorder<M::State>,
    rng: SimRng,
    diagnostics: Vec<Diagnostic>,
    events_applied: usize,
    rejections: usize,
    state: RunState,
}

impl<M: Model> Simulation<M> {
    /// Create a simulation with a generator seeded from `seed`.
    pub fn new(model: M, initial_time: f64, seed: u64) -> Result<Self> {
        Self::with_rng(model, initial_time, SimRng::seed_from_u64(seed))
    }

    /// Create a simulation, record the initial condition and compute the initial rates.
    pub fn with_rng(mut model: M, initial_time: f64, mut rng: SimRng) -> Result<Self> {
        let mut history = HistoryRecorder::new(model.tracked_states());
        history.record_initial(
            initial_time,
            model.population().iter().map(|(_, state)| state),
        )?;

        let mut rates = RateSampler::new();
        let entities: Vec<EntityId> = model.population().entities().collect();
        for entity in entities {
            let mut context = Context::new(initial_time, &mut rng);
            let rate = model.maximal_rate(entity, &mut context)?;
            rates.upsert(entity, rate)?;
        }
        log::debug!("Initial rates: {rates}");

        Ok(Self {
            model,
            time: initial_time,
            rates,
            queue: EventQueue::new(),
            history,
            rng,
            diagnostics: Vec::new(),
            events_applied: 0,
            rejections: 0,
            state: RunState::Running,
        })
    }

    /// Schedule a deterministic event at `due`.
    pub fn schedule(&mut self, due: f64, event: M::Event) -> Result<()> {
        if due.is_nan() {
            return Err(GillespieError::InvalidSchedule { due });
        }
        log::trace!("Scheduling {event:?} at {due}");
        self.queue.insert(due, event);
        Ok(())
    }

    /// Run until the population is exhausted or the clock crosses `horizon`.
    ///
    /// A finished simulation returns its termination without doing any work.
    pub fn run(&mut self, horizon: f64) -> Result<Termination> {
        if let RunState::Finished(termination) = self.state {
            return Ok(termination);
        }

        let termination = self.run_until(horizon)?;
        self.state = RunState::Finished(termination);
        log::info!(
            r###"
        termination={termination}
        time={}
        events_applied={}
        rejections={}"###,
            self.time,
            self.events_applied,
            self.rejections
        );
        Ok(termination)
    }

    fn run_until(&mut self, horizon: f64) -> Result<Termination> {
        loop {
            if !self.rates.is_active() && self.queue.is_empty() {
                return Ok(Termination::NaturalExhaustion);
            }

            let mut candidate = self.rates.time_to_next_candidate(&mut self.rng);

            // execute scheduled events that precede the candidate
            while self.queue.earliest_due_before(self.time + candidate) {
                let Some(scheduled) = self.queue.pop_earliest() else {
                    break;
                };
                if scheduled.due < self.time {
                    self.discard_stale(scheduled.due);
                    continue;
                }
                self.time = scheduled.due;
                if self.time >= horizon {
                    return Ok(Termination::HorizonReached);
                }
                self.apply(scheduled.into_event())?;
                candidate = self.rates.time_to_next_candidate(&mut self.rng);
            }

            // anything still queued is due at infinity
            if candidate.is_infinite() {
                return Ok(match self.queue.is_empty() {
                    true => Termination::NaturalExhaustion,
                    false => Termination::HorizonReached,
                });
            }

            self.time += candidate;
            if self.time >= horizon {
                return Ok(Termination::HorizonReached);
            }

            let entity = self.rates.choose_random(&mut self.rng).ok_or_else(|| {
                GillespieError::ImplementationError(
                    "Candidate drawn from an exhausted sampler".to_string(),
                )
            })?;
            let rate = self.rates.rate(entity).unwrap_or(0.);
            let decision = {
                let mut context = Context::new(self.time, &mut self.rng);
                self.model.decide(entity, rate, &mut context)?
            };

            match decision {
                Decision::NoEvent => self.rejections += 1,
                Decision::Event(event) => self.apply(event)?,
            }
        }
    }

    fn apply(&mut self, event: M::Event) -> Result<()> {
        log::debug!("t={}: {event:?}", self.time);
        let outcome = {
            let mut context = Context::new(self.time, &mut self.rng);
            self.model.apply(event, &mut context)?
        };

        for record in outcome.records {
            self.history.record(self.time, record)?;
        }
        for (due, event) in outcome.scheduled {
            self.schedule(due, event)?;
        }
        for &entity in outcome.influenced.iter() {
            let mut context = Context::new(self.time, &mut self.rng);
            let rate = self.model.maximal_rate(entity, &mut context)?;
            self.rates.upsert(entity, rate)?;
        }

        self.events_applied += 1;
        Ok(())
    }

    fn discard_stale(&mut self, due: f64) {
        let diagnostic = Diagnostic::StaleEvent {
            due,
            now: self.time,
        };
        log::warn!("Event queue produced an event in the past, ignoring: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn rates(&self) -> &RateSampler {
        &self.rates
    }

    pub fn history(&self) -> &HistoryRecorder<M::State> {
        &self.history
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn export_history(&self) -> HistoryTable {
        self.history.export()
    }

    /// Summary of the run, stored alongside a persisted history.
    pub fn attributes(&self) -> Attributes {
        let termination = match self.state {
            RunState::Running => "running".to_string(),
            RunState::Finished(termination) => termination.to_string(),
        };
        Attributes::from([
            ("termination".to_string(), termination),
            ("time".to_string(), self.time.to_string()),
            ("events_applied".to_string(), self.events_applied.to_string()),
            ("rejections".to_string(), self.rejections.to_string()),
            ("diagnostics".to_string(), self.diagnostics.len().to_string()),
        ])
    }

    /// Persist the history as a new group of `writer` and return the group id.
    pub fn persist(
        &self,
        writer: &mut impl HistoryWriter,
        run_id: Option<&str>,
        attributes: &Attributes,
    ) -> Result<String> {
        let mut all_attributes = self.attributes();
        all_attributes.extend(attributes.clone());
        writer.write(&self.export_history(), run_id, &all_attributes)
    }
}
