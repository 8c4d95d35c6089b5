//! All errors that can occur in the gillespymax library.

use std::fmt;

use crate::core::EntityId;

pub type Result<T> = std::result::Result<T, GillespieError>;

#[derive(Debug)]
pub enum GillespieError {
    /// Required configuration keys that are absent.
    MissingParameters(Vec<String>),
    InvalidParameter { key: String, reason: String },
    /// Entities of the population without an initial state.
    MissingInitialState(Vec<EntityId>),
    /// A model met a state it has no rule for.
    UnhandledState { entity: EntityId, state: String },
    InvalidRate { entity: EntityId, rate: f64 },
    InvalidSchedule { due: f64 },
    ImplementationError(String),
    ReadError(String),
    WriteError(String),
    GroupExists(String),
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Csv(csv::Error),
}

impl fmt::Display for GillespieError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GillespieError::MissingParameters(keys) => {
                write!(f, "MissingParameters: {}", keys.join(", "))
            }
            GillespieError::InvalidParameter { key, reason } => {
                write!(f, "InvalidParameter: {key} ({reason})")
            }
            GillespieError::MissingInitialState(entities) => {
                let entities: Vec<String> = entities.iter().map(|e| e.to_string()).collect();
                write!(f, "MissingInitialState: {}", entities.join(", "))
            }
            GillespieError::UnhandledState { entity, state } => {
                write!(f, "UnhandledState: state {state} of entity {entity}")
            }
            GillespieError::InvalidRate { entity, rate } => {
                write!(f, "InvalidRate: rate {rate} of entity {entity}")
            }
            GillespieError::InvalidSchedule { due } => {
                write!(f, "InvalidSchedule: event due at {due}")
            }
            GillespieError::ImplementationError(message) => {
                write!(f, "ImplementationError: {message}")
            }
            GillespieError::ReadError(message) => write!(f, "ReadError: {message}"),
            GillespieError::WriteError(message) => write!(f, "WriteError: {message}"),
            GillespieError::GroupExists(run_id) => write!(f, "GroupExists: {run_id}"),
            GillespieError::Io(error) => write!(f, "IO error: {error}"),
            GillespieError::Yaml(error) => write!(f, "YAML error: {error}"),
            GillespieError::Csv(error) => write!(f, "CSV error: {error}"),
        }
    }
}

impl std::error::Error for GillespieError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GillespieError::Io(error) => Some(error),
            GillespieError::Yaml(error) => Some(error),
            GillespieError::Csv(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GillespieError {
    fn from(error: std::io::Error) -> Self {
        GillespieError::Io(error)
    }
}

impl From<serde_yaml::Error> for GillespieError {
    fn from(error: serde_yaml::Error) -> Self {
        GillespieError::Yaml(error)
    }
}

impl From<csv::Error> for GillespieError {
    fn from(error: csv::Error) -> Self {
        GillespieError::Csv(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_missing_key() {
        let error = GillespieError::MissingParameters(vec!["beta".into(), "kappa".into()]);
        assert_eq!(error.to_string(), "MissingParameters: beta, kappa");
    }

    #[test]
    fn display_tags_entity_and_state() {
        let error = GillespieError::UnhandledState {
            entity: EntityId(7),
            state: "S".into(),
        };
        assert_eq!(error.to_string(), "UnhandledState: state S of entity 7");
    }
}
