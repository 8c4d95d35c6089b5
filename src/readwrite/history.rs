//! Persist histories as groups of a directory container.
//!
//! Every run is stored as its own group `<container>/<run_id>/`:
//!
//! - `t.npy`: event times,
//! - `counts/<state>.npy`: one count column per tracked state,
//! - `events.csv`: the text columns of the event log,
//! - `attributes.yaml`: free form run attributes.
//!
//! The file `<container>/runs.csv` indexes all groups of a container.

use npyz::WriterBuilder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::HistoryTable;
use crate::errors::{GillespieError, Result};

pub type Attributes = BTreeMap<String, String>;

const INDEX_FILE: &str = "runs.csv";
const TIME_FILE: &str = "t.npy";
const COUNTS_DIR: &str = "counts";
const EVENTS_FILE: &str = "events.csv";
const ATTRIBUTES_FILE: &str = "attributes.yaml";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Add groups to an existing container; existing groups are never replaced.
    Append,
    /// Clear the container before the first group is written.
    Overwrite,
}

pub trait HistoryWriter {
    /// Write `table` as a new group and return its id.
    ///
    /// Without a `run_id` a unique id is generated.
    fn write(
        &mut self,
        table: &HistoryTable,
        run_id: Option<&str>,
        attributes: &Attributes,
    ) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    run_id: String,
    rows: usize,
    states: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EventEntry {
    enode: String,
    anode: String,
    group: String,
    efrom: String,
    eto: String,
    astatus: String,
    txncode: String,
}

/// Time stamp and random suffix, e.g. `1718000000000000_0a1b2c3d`.
pub fn generate_run_id() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_micros())
        .unwrap_or(0);
    let suffix: u32 = rand::rng().random();
    format!("{micros}_{suffix:08x}")
}

#[derive(Debug)]
pub struct NpyHistoryWriter {
    path: PathBuf,
    mode: WriteMode,
    cleared: bool,
}

impl NpyHistoryWriter {
    pub fn new(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
            cleared: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the container. In overwrite mode the first call removes the groups listed in an
    /// existing index and the index itself; anything else in the directory is left alone.
    fn prepare_container(&mut self) -> Result<()> {
        if self.mode == WriteMode::Overwrite && !self.cleared && self.path.exists() {
            let index = self.path.join(INDEX_FILE);
            if index.is_file() {
                log::info!("Clearing output container {}", self.path.display());
                for entry in read_index(&self.path)? {
                    check_run_id(&entry.run_id)?;
                    let group = self.path.join(&entry.run_id);
                    if group.is_dir() {
                        fs::remove_dir_all(group)?;
                    }
                }
                fs::remove_file(index)?;
            } else if !self.path.is_dir() || fs::read_dir(&self.path)?.next().is_some() {
                return Err(GillespieError::WriteError(format!(
                    "{} is not a history container, refusing to overwrite",
                    self.path.display()
                )));
            }
        }
        self.cleared = true;
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    fn append_index(&self, entry: &IndexEntry) -> Result<()> {
        let path = self.path.join(INDEX_FILE);
        let exists = path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !exists {
            csv_writer.write_record(["run_id", "rows", "states"])?;
        }
        csv_writer.serialize(entry)?;
        csv_writer.flush()?;
        Ok(())
    }
}

impl HistoryWriter for NpyHistoryWriter {
    fn write(
        &mut self,
        table: &HistoryTable,
        run_id: Option<&str>,
        attributes: &Attributes,
    ) -> Result<String> {
        let run_id = match run_id {
            Some(run_id) => run_id.to_string(),
            None => generate_run_id(),
        };
        check_run_id(&run_id)?;
        check_columns(table)?;

        self.prepare_container()?;
        let group = self.path.join(&run_id);
        if group.exists() {
            return Err(GillespieError::GroupExists(run_id));
        }
        fs::create_dir_all(group.join(COUNTS_DIR))?;

        write_npy(&group.join(TIME_FILE), &table.time)?;
        for (state, column) in table.states.iter().zip(&table.counts) {
            write_npy(&group.join(COUNTS_DIR).join(format!("{state}.npy")), column)?;
        }
        write_events(&group.join(EVENTS_FILE), table)?;
        let file = fs::File::create(group.join(ATTRIBUTES_FILE))?;
        serde_yaml::to_writer(std::io::BufWriter::new(file), attributes)?;

        self.append_index(&IndexEntry {
            run_id: run_id.clone(),
            rows: table.len(),
            states: table.states.join(";"),
        })?;
        log::debug!("Wrote {} rows to group {run_id}", table.len());
        Ok(run_id)
    }
}

fn check_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.starts_with('.') {
        return Err(GillespieError::WriteError(format!(
            "Invalid group name '{run_id}'"
        )));
    }
    Ok(())
}

/// Every column of `table` must have one entry per row.
fn check_columns(table: &HistoryTable) -> Result<()> {
    if table.states.len() != table.counts.len() {
        return Err(GillespieError::WriteError(format!(
            "{} states but {} count columns",
            table.states.len(),
            table.counts.len()
        )));
    }

    let rows = table.len();
    let text_columns = [
        ("entity", table.entity.len()),
        ("auxiliary", table.auxiliary.len()),
        ("context", table.context.len()),
        ("from_state", table.from_state.len()),
        ("to_state", table.to_state.len()),
        ("auxiliary_status", table.auxiliary_status.len()),
        ("transition_code", table.transition_code.len()),
    ];
    let count_columns = table
        .states
        .iter()
        .zip(&table.counts)
        .map(|(state, column)| (state.as_str(), column.len()));
    for (name, len) in text_columns.into_iter().chain(count_columns) {
        if len != rows {
            return Err(GillespieError::WriteError(format!(
                "Column {name} has {len} entries for {rows} rows"
            )));
        }
    }
    Ok(())
}

fn write_npy<T>(path: &Path, data: &[T]) -> Result<()>
where
    T: npyz::AutoSerialize + Copy,
{
    let file = fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let shape = &[data.len() as u64];
    let mut npy_writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(shape)
        .writer(&mut writer)
        .begin_nd()
        .map_err(|e| GillespieError::WriteError(format!("{}: {e}", path.display())))?;
    npy_writer
        .extend(data.iter().copied())
        .map_err(|e| GillespieError::WriteError(format!("{}: {e}", path.display())))?;
    npy_writer
        .finish()
        .map_err(|e| GillespieError::WriteError(format!("{}: {e}", path.display())))?;
    writer.flush()?;
    Ok(())
}

fn read_npy<T: npyz::Deserialize>(path: &Path) -> Result<Vec<T>> {
    let read_error = |e: std::io::Error| {
        GillespieError::ReadError(format!("Failed to read {}: {e}", path.display()))
    };
    let file = fs::File::open(path).map_err(read_error)?;
    let npy_data = npyz::NpyFile::new(std::io::BufReader::new(file)).map_err(read_error)?;
    npy_data
        .data::<T>()
        .map_err(|e| GillespieError::ReadError(format!("{}: {e}", path.display())))?
        .map(|value| value.map_err(read_error))
        .collect()
}

fn write_events(path: &Path, table: &HistoryTable) -> Result<()> {
    let mut csv_writer = csv::Writer::from_path(path)?;
    for row in 0..table.len() {
        csv_writer.serialize(EventEntry {
            enode: table.entity[row].clone(),
            anode: table.auxiliary[row].clone(),
            group: table.context[row].clone(),
            efrom: table.from_state[row].clone(),
            eto: table.to_state[row].clone(),
            astatus: table.auxiliary_status[row].clone(),
            txncode: table.transition_code[row].clone(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn read_group(container: &Path, entry: &IndexEntry) -> Result<HistoryTable> {
    let group = container.join(&entry.run_id);
    let mut table = HistoryTable::with_capacity(entry.rows);
    table.time = read_npy(&group.join(TIME_FILE))?;

    let mut reader = csv::Reader::from_path(group.join(EVENTS_FILE)).map_err(|_err| {
        GillespieError::ReadError(format!("Failed to read events of {}", entry.run_id))
    })?;
    for record in reader.deserialize() {
        let record: EventEntry = record.map_err(|_err| {
            GillespieError::ReadError(format!("Failed to parse event of {}", entry.run_id))
        })?;
        table.entity.push(record.enode);
        table.auxiliary.push(record.anode);
        table.context.push(record.group);
        table.from_state.push(record.efrom);
        table.to_state.push(record.eto);
        table.auxiliary_status.push(record.astatus);
        table.transition_code.push(record.txncode);
    }

    table.states = entry
        .states
        .split(';')
        .filter(|state| !state.is_empty())
        .map(str::to_string)
        .collect();
    for state in &table.states {
        table
            .counts
            .push(read_npy(&group.join(COUNTS_DIR).join(format!("{state}.npy")))?);
    }

    let consistent = table.entity.len() == table.len()
        && table.len() == entry.rows
        && table.counts.iter().all(|column| column.len() == entry.rows);
    if !consistent {
        return Err(GillespieError::ReadError(format!(
            "Columns of group {} differ in length",
            entry.run_id
        )));
    }
    Ok(table)
}

fn read_index(container: &Path) -> Result<Vec<IndexEntry>> {
    let index = container.join(INDEX_FILE);
    let mut reader = csv::Reader::from_path(&index).map_err(|_err| {
        GillespieError::ReadError(format!("Failed to read from {}", index.display()))
    })?;
    reader
        .deserialize()
        .map(|entry| {
            entry.map_err(|_err| {
                GillespieError::ReadError(format!("Failed to parse record in {}", index.display()))
            })
        })
        .collect()
}

/// Read every group listed in the index of `container`.
pub fn read_records(container: impl AsRef<Path>) -> Result<BTreeMap<String, HistoryTable>> {
    let container = container.as_ref();
    let mut records = BTreeMap::new();
    for entry in read_index(container)? {
        let table = read_group(container, &entry)?;
        records.insert(entry.run_id, table);
    }
    Ok(records)
}

pub fn read_attributes(container: impl AsRef<Path>, run_id: &str) -> Result<Attributes> {
    let file = fs::File::open(container.as_ref().join(run_id).join(ATTRIBUTES_FILE))?;
    Ok(serde_yaml::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityId, EventRecord, HistoryRecorder};

    fn table() -> HistoryTable {
        let mut history = HistoryRecorder::new(vec!['S', 'E', 'I']);
        history.record_initial(0., ['S', 'S', 'I']).unwrap();
        history
            .record(
                0.5,
                EventRecord::new(EntityId(0), 'S', 'E')
                    .with_auxiliary(vec![EntityId(2)], "I")
                    .with_context("household"),
            )
            .unwrap();
        history
            .record(1.25, EventRecord::new(EntityId(0), 'E', 'I'))
            .unwrap();
        history.export()
    }

    #[test]
    fn written_groups_can_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("out");
        let mut writer = NpyHistoryWriter::new(&container, WriteMode::Append);
        let attributes = Attributes::from([("seed".to_string(), "7".to_string())]);

        let table = table();
        let run_id = writer.write(&table, Some("first"), &attributes).unwrap();
        assert_eq!(run_id, "first");

        let records = read_records(&container).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["first"], table);
        assert_eq!(read_attributes(&container, "first").unwrap(), attributes);
    }

    #[test]
    fn npy_columns_use_numpy_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        writer.write(&table(), Some("run"), &Attributes::new()).unwrap();

        let bytes = fs::read(dir.path().join("run").join("counts").join("E.npy")).unwrap();
        let npy_data = npyz::NpyFile::new(bytes.as_slice()).unwrap();
        assert_eq!(npy_data.shape(), &[3]);
        let data: Vec<u64> = npy_data
            .data::<u64>()
            .unwrap()
            .map(|el| el.unwrap())
            .collect();
        assert_eq!(data, vec![0, 1, 0]);
    }

    #[test]
    fn append_refuses_existing_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        writer.write(&table(), Some("run"), &Attributes::new()).unwrap();

        let mut other = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        assert!(matches!(
            other.write(&table(), Some("run"), &Attributes::new()),
            Err(GillespieError::GroupExists(_))
        ));
        other
            .write(&table(), Some("second"), &Attributes::new())
            .unwrap();
        assert_eq!(read_records(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn overwrite_clears_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        writer.write(&table(), Some("old"), &Attributes::new()).unwrap();

        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Overwrite);
        writer.write(&table(), Some("a"), &Attributes::new()).unwrap();
        writer.write(&table(), Some("b"), &Attributes::new()).unwrap();

        let records = read_records(dir.path()).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn overwrite_keeps_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("out");
        let mut writer = NpyHistoryWriter::new(&container, WriteMode::Append);
        writer.write(&table(), Some("old"), &Attributes::new()).unwrap();
        fs::write(container.join("notes.txt"), "keep me").unwrap();

        let mut writer = NpyHistoryWriter::new(&container, WriteMode::Overwrite);
        writer.write(&table(), Some("new"), &Attributes::new()).unwrap();

        assert!(!container.join("old").exists());
        assert_eq!(
            fs::read_to_string(container.join("notes.txt")).unwrap(),
            "keep me"
        );
        let records = read_records(&container).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["new"]);
    }

    #[test]
    fn overwrite_refuses_foreign_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("thesis.tex"), "draft").unwrap();

        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Overwrite);
        assert!(matches!(
            writer.write(&table(), Some("run"), &Attributes::new()),
            Err(GillespieError::WriteError(_))
        ));
        assert!(dir.path().join("thesis.tex").exists());
        assert!(!dir.path().join("run").exists());
    }

    #[test]
    fn overwrite_accepts_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Overwrite);
        writer.write(&table(), Some("run"), &Attributes::new()).unwrap();
        assert_eq!(read_records(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn ragged_tables_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);

        let mut short_text = table();
        short_text.context.pop();
        assert!(matches!(
            writer.write(&short_text, Some("a"), &Attributes::new()),
            Err(GillespieError::WriteError(_))
        ));

        let mut short_counts = table();
        short_counts.counts[1].pop();
        assert!(matches!(
            writer.write(&short_counts, Some("b"), &Attributes::new()),
            Err(GillespieError::WriteError(_))
        ));
        assert!(!dir.path().join("a").exists());
        assert!(!dir.path().join("b").exists());
    }

    #[test]
    fn generated_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        let first = writer.write(&table(), None, &Attributes::new()).unwrap();
        let second = writer.write(&table(), None, &Attributes::new()).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.split('_').nth(1).map(str::len), Some(8));
    }

    #[test]
    fn invalid_group_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyHistoryWriter::new(dir.path(), WriteMode::Append);
        assert!(
            writer
                .write(&table(), Some("a/b"), &Attributes::new())
                .is_err()
        );
        assert!(writer.write(&table(), Some(""), &Attributes::new()).is_err());
    }

    #[test]
    fn missing_container_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_records(dir.path().join("absent")),
            Err(GillespieError::ReadError(_))
        ));
    }
}
