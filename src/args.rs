use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, name = "gillespymax")]
pub struct Args {
    /// Path to settings (yaml file).
    #[clap(long)]
    pub settings: String,

    /// Path to the output container (directory).
    #[clap(long, short)]
    pub output: String,

    /// Simulated time after which a run is stopped.
    #[clap(long, default_value_t = f64::INFINITY)]
    pub horizon: f64,

    /// Seed of the first replicate; replicate `i` uses `seed + i`.
    #[clap(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of independent runs.
    #[clap(long, short, default_value_t = 1)]
    pub replicates: usize,

    /// Name of the experiment, used as prefix of the run ids.
    #[clap(long, short, default_value = "run")]
    pub name: String,

    /// Clear the output container before writing.
    #[clap(long)]
    pub overwrite: bool,

    /// Path to log file.
    #[clap(long, default_value = "gillespymax.log")]
    pub log_file: String,

    /// Increase logging verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable progress bar.
    #[clap(long)]
    pub disable_progress_bar: bool,
}
