use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;

use crate::args::Args;
use crate::config::Settings;
use crate::core::SimRng;
use crate::models::contagion::PARAMETERS;
use crate::models::{ContagionModel, ContagionState};
use crate::network::ContactNetwork;
use crate::readwrite::{Attributes, NpyHistoryWriter, WriteMode};
use crate::simulation::Simulation;

pub struct Runner {
    args: Args,
    settings: Settings,
    writer: NpyHistoryWriter,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        Self::setup_logger(&args)?;

        let settings = Self::load_settings(&args.settings)?;
        let mode = match args.overwrite {
            true => WriteMode::Overwrite,
            false => WriteMode::Append,
        };
        let writer = NpyHistoryWriter::new(&args.output, mode);

        Ok(Self {
            args,
            settings,
            writer,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        let bar = match self.args.disable_progress_bar {
            true => None,
            false => {
                let bar = ProgressBar::new(self.args.replicates as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                        )?
                        .progress_chars("=> "),
                );
                Some(bar)
            }
        };

        for replicate in 0..self.args.replicates {
            let seed = self.args.seed.wrapping_add(replicate as u64);
            let simulation = self
                .run_replicate(seed)
                .with_context(|| format!("Replicate {replicate} with seed {seed} failed"))?;

            let run_id = format!("{}_{replicate}", self.args.name);
            let attributes = Attributes::from([
                ("name".to_string(), self.args.name.clone()),
                ("replicate".to_string(), replicate.to_string()),
                ("seed".to_string(), seed.to_string()),
            ]);
            simulation
                .persist(&mut self.writer, Some(&run_id), &attributes)
                .with_context(|| format!("Unable to write {run_id}"))?;

            if let Some(bar) = bar.as_ref() {
                bar.inc(1);
                bar.set_message(format!(
                    "{run_id}: {} events until t={:.3}",
                    simulation.events_applied(),
                    simulation.time()
                ));
            }
        }

        if let Some(bar) = bar {
            bar.finish_with_message("Done.");
        }
        log::info!(
            "Stored {} runs in {}",
            self.args.replicates,
            self.writer.path().display()
        );
        Ok(())
    }

    fn run_replicate(&self, seed: u64) -> Result<Simulation<ContagionModel>> {
        let mut rng = SimRng::seed_from_u64(seed);
        let network_settings = &self.settings.network;
        let network = ContactNetwork::two_layer(
            network_settings.n_individuals,
            network_settings.n_households,
            network_settings.n_communities,
            network_settings.p_community,
            &mut rng,
        )?;
        let initial_state = network.seed_initial_state(
            self.settings.seeding.num,
            ContagionState::S,
            ContagionState::E,
            &mut rng,
        );

        let model = ContagionModel::new(network, &initial_state, &self.settings.parameters, 0.)?;
        let mut simulation = Simulation::with_rng(model, 0., rng)?;
        simulation.run(self.args.horizon)?;
        Ok(simulation)
    }

    /// Setup logging level and file
    fn setup_logger(args: &Args) -> Result<()> {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level)
            .with_context(|| format!("Unable to open log file {}", args.log_file))
    }

    /// Load settings from file
    fn load_settings(path: &str) -> Result<Settings> {
        let settings = Settings::checked_load(path, PARAMETERS.keys().copied())?;
        log::info!("Loaded settings\n{}", settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkSettings, Parameters, Seeding};
    use crate::readwrite::{read_attributes, read_records};
    use serial_test::serial;

    fn settings() -> Settings {
        let parameters: Parameters = [
            ("beta", 0.5),
            ("prop_time_at_home", 0.6),
            ("sigma_demographic", 0.9),
            ("incubation_scale", 1.),
            ("incubation_shape", 2.),
            ("alpha_recover", 0.3),
            ("alpha_mort", 0.02),
            ("prob_death", 0.05),
            ("p_test_0", 0.4),
            ("kappa", 0.5),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        Settings {
            parameters,
            seeding: Seeding { num: 2 },
            network: NetworkSettings {
                n_individuals: 60,
                n_households: 20,
                n_communities: 2,
                p_community: 0.3,
            },
        }
    }

    fn args(dir: &std::path::Path) -> Args {
        Args {
            settings: dir.join("settings.yaml").to_string_lossy().into_owned(),
            output: dir.join("out").to_string_lossy().into_owned(),
            horizon: 100.,
            seed: 42,
            replicates: 2,
            name: "test".to_string(),
            overwrite: false,
            log_file: dir.join("test.log").to_string_lossy().into_owned(),
            verbose: 0,
            disable_progress_bar: true,
        }
    }

    #[test]
    #[serial]
    fn runs_and_stores_replicates() {
        let dir = tempfile::tempdir().unwrap();
        settings()
            .write_to_file(dir.path().join("settings.yaml"))
            .unwrap();

        let mut runner = Runner::new(args(dir.path())).unwrap();
        runner.start().unwrap();

        let records = read_records(dir.path().join("out")).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["test_0", "test_1"]);
        for table in records.values() {
            assert_eq!(table.states, vec!["S", "E", "I", "R", "T", "D"]);
            let first: u64 = table.counts.iter().map(|column| column[0]).sum();
            assert_eq!(first, 60);
        }
        let attributes = read_attributes(dir.path().join("out"), "test_1").unwrap();
        assert_eq!(attributes["seed"], "43");
        assert!(attributes.contains_key("termination"));
    }

    #[test]
    #[serial]
    fn missing_parameters_fail_early() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings();
        settings.parameters = Parameters::new();
        settings
            .write_to_file(dir.path().join("settings.yaml"))
            .unwrap();

        let error = Runner::new(args(dir.path())).err().unwrap();
        assert!(error.to_string().contains("MissingParameters"));
    }
}
