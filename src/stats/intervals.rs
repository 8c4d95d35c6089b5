use std::collections::{HashMap, HashSet};

use crate::core::HistoryTable;

/// Delays between the first `from_code` transition of each entity and its first later `to_code`
/// transition, in order of the `from_code` rows.
///
/// Entities that never reach `to_code` do not contribute.
pub fn transition_intervals(table: &HistoryTable, from_code: &str, to_code: &str) -> Vec<f64> {
    let mut started: HashMap<&str, (usize, f64)> = HashMap::new();
    let mut intervals: Vec<(usize, f64)> = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();

    for row in 0..table.len() {
        let entity = table.entity[row].as_str();
        if entity.is_empty() || done.contains(entity) {
            continue;
        }
        let code = table.transition_code[row].as_str();
        match started.get(entity) {
            Some(&(order, start)) if code == to_code => {
                intervals.push((order, table.time[row] - start));
                done.insert(entity);
            }
            None if code == from_code => {
                let order = started.len();
                started.insert(entity, (order, table.time[row]));
            }
            _ => {}
        }
    }

    intervals.sort_by_key(|&(order, _)| order);
    intervals.into_iter().map(|(_, interval)| interval).collect()
}

/// Counts of every tracked state after the last row.
pub fn final_counts(table: &HistoryTable) -> Vec<(String, u64)> {
    table
        .states
        .iter()
        .zip(&table.counts)
        .map(|(state, column)| (state.clone(), column.last().copied().unwrap_or(0)))
        .collect()
}
