use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{GillespieError, Result};

/// Named numeric model parameters.
///
/// Parameters are never defaulted: a model declares the keys it requires and construction fails
/// when any of them is absent.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, f64>);

impl FromIterator<(String, f64)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(key.into(), value)
    }

    /// Check that every key in `required` is present.
    ///
    /// The error lists all missing keys in the order of `required`.
    pub fn check<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let missing: Vec<String> = required
            .into_iter()
            .filter(|key| !self.0.contains_key(*key))
            .map(str::to_string)
            .collect();
        match missing.is_empty() {
            true => Ok(()),
            false => Err(GillespieError::MissingParameters(missing)),
        }
    }

    pub fn get(&self, key: &str) -> Result<f64> {
        self.0
            .get(key)
            .copied()
            .ok_or_else(|| GillespieError::MissingParameters(vec![key.to_string()]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, &value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
