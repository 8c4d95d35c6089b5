//! This module contains the core datatypes of the library.

mod entity;

pub mod history;
pub mod model;
pub mod population;
pub mod queue;
pub mod sampler;

pub use entity::{EntityId, SimRng};
pub use history::{EventRecord, HistoryRecorder, HistoryTable};
pub use model::{Context, Decision, Model, Outcome, StateLabel};
pub use population::Population;
pub use queue::{EventQueue, ScheduledEvent};
pub use sampler::RateSampler;
