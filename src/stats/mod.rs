//! Statistics over recorded histories

mod intervals;

pub use intervals::{final_counts, transition_intervals};
