//! Configuration data structures for simulation setups.

mod parameters;
mod settings;

pub use parameters::Parameters;
pub use settings::{NetworkSettings, Seeding, Settings};
