//! IO for persisting simulation histories.

mod history;

pub use history::{
    Attributes, HistoryWriter, NpyHistoryWriter, WriteMode, generate_run_id, read_attributes,
    read_records,
};
