//! Settings module.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::parameters::Parameters;
use crate::errors::Result;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub parameters: Parameters,
    pub seeding: Seeding,
    pub network: NetworkSettings,
}

/// Initial condition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Seeding {
    /// Number of initially exposed individuals.
    pub num: usize,
}

/// Shape of the two layer contact network.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NetworkSettings {
    pub n_individuals: usize,
    pub n_households: usize,
    /// Community memberships per individual.
    pub n_communities: usize,
    /// Probability that a membership opens a new community.
    pub p_community: f64,
}

impl std::fmt::Display for Settings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = vec![];
        self.write(&mut output).map_err(|_| std::fmt::Error)?;
        write!(formatter, "{}", String::from_utf8_lossy(&output))
    }
}

impl Settings {
    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<()> {
        Ok(serde_yaml::to_writer(writer, self)?)
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<Settings> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn write_to_file(&self, filename: impl AsRef<Path>) -> Result<()> {
        let file = fs::File::create(filename)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: impl AsRef<Path>) -> Result<Settings> {
        let file = fs::File::open(filename)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Read settings and check that all `required` parameters are present.
    pub fn checked_load<'a>(
        filename: impl AsRef<Path>,
        required: impl IntoIterator<Item = &'a str>,
    ) -> Result<Settings> {
        let settings = Self::read_from_file(filename)?;
        settings.parameters.check(required)?;
        Ok(settings)
    }
}
