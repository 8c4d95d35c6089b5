//! Concrete models.

pub mod contagion;
mod hazard;

pub use contagion::{ContagionEvent, ContagionModel, ContagionState};
pub use hazard::{GammaHazard, ln_gamma};
