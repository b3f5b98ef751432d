// crates.io
use clap::Parser;
// self
use sift_eval::Args;

fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	sift_eval::run(args)
}
