use anyhow::Result;
use clap::Parser;

use gillespymax::args::Args;
use gillespymax::runner::Runner;

fn main() -> Result<()> {
    let args = Args::parse();
    let mut runner = Runner::new(args)?;
    runner.start()
}
