//! History --- append-only log of state changes
//!
//! The history records every state change of a run together with the number of entities in each
//! tracked state right after the change. The first row is a census of the initial states, every
//! later row derives its counts from the previous row by exactly one decrement and one increment.
//!

use itertools::Itertools;
use std::collections::HashMap;

use crate::core::{EntityId, StateLabel};
use crate::errors::{GillespieError, Result};

/// A state change as reported by a model.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord<S> {
    /// The entity that changes state.
    pub entity: EntityId,
    /// Entities that take part in the event without changing state.
    pub auxiliary: Vec<EntityId>,
    /// Group or setting through which the event occurs.
    pub context: String,
    pub from: S,
    pub to: S,
    /// States of the auxiliary entities.
    pub auxiliary_status: String,
}

impl<S: StateLabel> EventRecord<S> {
    pub fn new(entity: EntityId, from: S, to: S) -> Self {
        Self {
            entity,
            auxiliary: Vec::new(),
            context: String::new(),
            from,
            to,
            auxiliary_status: String::new(),
        }
    }

    pub fn with_auxiliary(mut self, auxiliary: Vec<EntityId>, status: impl Into<String>) -> Self {
        self.auxiliary = auxiliary;
        self.auxiliary_status = status.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn transition_code(&self) -> String {
        transition_code(
            &self.from.to_string(),
            &self.to.to_string(),
            &self.auxiliary_status,
        )
    }
}

/// Canonical code of a transition, e.g. `(S,I) -> (E,I)`.
///
/// Empty components are left out, such that a spontaneous transition reads `(E) -> (I)`.
pub fn transition_code(from: &str, to: &str, auxiliary_status: &str) -> String {
    let pre = [from, auxiliary_status]
        .into_iter()
        .filter(|s| !s.is_empty())
        .join(",");
    let post = [to, auxiliary_status]
        .into_iter()
        .filter(|s| !s.is_empty())
        .join(",");
    format!("({pre}) -> ({post})")
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRow<S> {
    pub time: f64,
    /// `None` for the initial census row.
    pub record: Option<EventRecord<S>>,
    pub transition_code: String,
}

#[derive(Clone, Debug)]
pub struct HistoryRecorder<S> {
    states: Vec<S>,
    index: HashMap<S, usize>,
    rows: Vec<HistoryRow<S>>,
    // counts[state][row]
    counts: Vec<Vec<usize>>,
}

impl<S: StateLabel> HistoryRecorder<S> {
    /// Create an empty history that tracks the counts of `states`.
    pub fn new(states: Vec<S>) -> Self {
        let states: Vec<S> = states.into_iter().unique().collect();
        let index = states
            .iter()
            .enumerate()
            .map(|(idx, &state)| (state, idx))
            .collect();
        let counts = vec![Vec::new(); states.len()];
        Self {
            states,
            index,
            rows: Vec::new(),
            counts,
        }
    }

    /// Append the initial census row.
    pub fn record_initial(&mut self, t0: f64, states: impl IntoIterator<Item = S>) -> Result<()> {
        if !self.rows.is_empty() {
            return Err(GillespieError::ImplementationError(
                "Initial condition recorded twice".to_string(),
            ));
        }

        let census = states.into_iter().counts();
        for (state, column) in self.states.iter().zip(self.counts.iter_mut()) {
            column.push(census.get(state).copied().unwrap_or(0));
        }
        self.rows.push(HistoryRow {
            time: t0,
            record: None,
            transition_code: String::new(),
        });
        Ok(())
    }

    /// Append a state change at `time` and carry the counts forward.
    pub fn record(&mut self, time: f64, record: EventRecord<S>) -> Result<()> {
        let Some(last) = self.rows.last() else {
            return Err(GillespieError::ImplementationError(
                "Event recorded before the initial condition".to_string(),
            ));
        };
        if time < last.time {
            return Err(GillespieError::ImplementationError(format!(
                "Event at {time} recorded after {}",
                last.time
            )));
        }

        for column in self.counts.iter_mut() {
            let previous = column[column.len() - 1];
            column.push(previous);
        }
        if let Some(&idx) = self.index.get(&record.from) {
            let count = self.counts[idx].last_mut().ok_or_else(|| {
                GillespieError::ImplementationError("Empty count column".to_string())
            })?;
            *count = count.checked_sub(1).ok_or_else(|| {
                GillespieError::ImplementationError(format!(
                    "Entity {} leaves state {} that has no members",
                    record.entity, record.from
                ))
            })?;
        }
        if let Some(&idx) = self.index.get(&record.to) {
            if let Some(count) = self.counts[idx].last_mut() {
                *count += 1;
            }
        }

        let transition_code = record.transition_code();
        self.rows.push(HistoryRow {
            time,
            record: Some(record),
            transition_code,
        });
        Ok(())
    }

    pub fn rows(&self) -> &[HistoryRow<S>] {
        &self.rows
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Counts of all tracked states right after row `row`.
    pub fn counts_at(&self, row: usize) -> Option<Vec<usize>> {
        self.counts
            .iter()
            .map(|column| column.get(row).copied())
            .collect()
    }

    /// Current count of `state`.
    pub fn count(&self, state: S) -> Option<usize> {
        let idx = *self.index.get(&state)?;
        self.counts[idx].last().copied()
    }

    /// Expose the log as columns.
    pub fn export(&self) -> HistoryTable {
        let mut table = HistoryTable::with_capacity(self.rows.len());
        for row in &self.rows {
            table.time.push(row.time);
            match &row.record {
                Some(record) => {
                    table.entity.push(record.entity.to_string());
                    table
                        .auxiliary
                        .push(record.auxiliary.iter().map(|e| e.to_string()).join(";"));
                    table.context.push(record.context.clone());
                    table.from_state.push(record.from.to_string());
                    table.to_state.push(record.to.to_string());
                    table.auxiliary_status.push(record.auxiliary_status.clone());
                }
                None => {
                    table.entity.push(String::new());
                    table.auxiliary.push(String::new());
                    table.context.push(String::new());
                    table.from_state.push(String::new());
                    table.to_state.push(String::new());
                    table.auxiliary_status.push(String::new());
                }
            }
            table.transition_code.push(row.transition_code.clone());
        }
        table.states = self.states.iter().map(|s| s.to_string()).collect();
        table.counts = self
            .counts
            .iter()
            .map(|column| column.iter().map(|&c| c as u64).collect())
            .collect();
        table
    }
}

/// Columnar view of a history.
///
/// Empty strings stand in for fields that do not apply, e.g. all event fields of the initial row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryTable {
    pub time: Vec<f64>,
    pub entity: Vec<String>,
    pub auxiliary: Vec<String>,
    pub context: Vec<String>,
    pub from_state: Vec<String>,
    pub to_state: Vec<String>,
    pub auxiliary_status: Vec<String>,
    pub transition_code: Vec<String>,
    /// Names of the tracked states, in column order.
    pub states: Vec<String>,
    /// One count column per tracked state.
    pub counts: Vec<Vec<u64>>,
}

impl HistoryTable {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            time: Vec::with_capacity(rows),
            entity: Vec::with_capacity(rows),
            auxiliary: Vec::with_capacity(rows),
            context: Vec::with_capacity(rows),
            from_state: Vec::with_capacity(rows),
            to_state: Vec::with_capacity(rows),
            auxiliary_status: Vec::with_capacity(rows),
            transition_code: Vec::with_capacity(rows),
            states: Vec::new(),
            counts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn count_column(&self, state: &str) -> Option<&[u64]> {
        let idx = self.states.iter().position(|s| s == state)?;
        self.counts.get(idx).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> HistoryRecorder<char> {
        let mut history = HistoryRecorder::new(vec!['S', 'I', 'R']);
        history
            .record_initial(0., ['S', 'S', 'S', 'I', 'X'])
            .unwrap();
        history
    }

    #[test]
    fn transition_codes_skip_empty_components() {
        assert_eq!(transition_code("E", "I", ""), "(E) -> (I)");
        assert_eq!(transition_code("S", "E", "I"), "(S,I) -> (E,I)");
    }

    #[test]
    fn initial_row_is_census() {
        let history = recorder();
        assert_eq!(history.len(), 1);
        assert_eq!(history.counts_at(0), Some(vec![3, 1, 0]));
        assert_eq!(history.rows()[0].transition_code, "");
    }

    #[test]
    fn record_moves_one_count() {
        let mut history = recorder();
        history
            .record(
                1.,
                EventRecord::new(EntityId(0), 'S', 'I')
                    .with_auxiliary(vec![EntityId(3)], "I")
                    .with_context("HH1"),
            )
            .unwrap();
        history
            .record(2.5, EventRecord::new(EntityId(3), 'I', 'R'))
            .unwrap();

        assert_eq!(history.counts_at(1), Some(vec![2, 2, 0]));
        assert_eq!(history.counts_at(2), Some(vec![2, 1, 1]));
        assert_eq!(history.count('R'), Some(1));
        assert_eq!(history.rows()[1].transition_code, "(S,I) -> (I,I)");
    }

    #[test]
    fn untracked_states_leave_counts_alone() {
        let mut history = recorder();
        history
            .record(1., EventRecord::new(EntityId(4), 'X', 'R'))
            .unwrap();
        assert_eq!(history.counts_at(1), Some(vec![3, 1, 1]));
    }

    #[test]
    fn record_rejects_out_of_order_and_uninitialised() {
        let mut empty: HistoryRecorder<char> = HistoryRecorder::new(vec!['S']);
        assert!(empty
            .record(0., EventRecord::new(EntityId(0), 'S', 'I'))
            .is_err());

        let mut history = recorder();
        history
            .record(2., EventRecord::new(EntityId(0), 'S', 'I'))
            .unwrap();
        assert!(history
            .record(1., EventRecord::new(EntityId(1), 'S', 'I'))
            .is_err());
        assert!(history.record_initial(0., ['S']).is_err());
    }

    #[test]
    fn record_rejects_leaving_an_empty_state() {
        let mut history = recorder();
        assert!(history
            .record(1., EventRecord::new(EntityId(0), 'R', 'S'))
            .is_err());
    }

    #[test]
    fn export_is_columnar() {
        let mut history = recorder();
        history
            .record(
                0.5,
                EventRecord::new(EntityId(1), 'S', 'I')
                    .with_auxiliary(vec![EntityId(3), EntityId(2)], "I"),
            )
            .unwrap();
        let table = history.export();

        assert_eq!(table.len(), 2);
        assert_eq!(table.time, vec![0., 0.5]);
        assert_eq!(table.entity, vec!["", "1"]);
        assert_eq!(table.auxiliary, vec!["", "3;2"]);
        assert_eq!(table.from_state, vec!["", "S"]);
        assert_eq!(table.transition_code[1], "(S,I) -> (I,I)");
        assert_eq!(table.states, vec!["S", "I", "R"]);
        assert_eq!(table.count_column("I"), Some(&[1u64, 2][..]));
        assert_eq!(table.count_column("Q"), None);
    }
}
