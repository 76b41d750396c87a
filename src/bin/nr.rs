#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::exit;

use log::LevelFilter;
use structopt::StructOpt;

use nr::cli::Options;
use nr::error::Result;

fn main() {
    let opts = Options::from_args();

    let level = match opts.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder().filter_level(level).init();

    if let Err(e) = run(opts) {
        error!("{}", e);
        exit(1)
    }
}

fn run(opts: Options) -> Result<()> {
    info!("nr {}", env!("CARGO_PKG_VERSION"));
    let config = opts.to_config();

    let mut out: Box<dyn Write> = match &opts.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    nr::run(config, &opts.files, out.as_mut())?;
    out.flush()?;
    Ok(())
}
