//! Command-line front end (component I): defines the `nr` argument surface
//! and resolves it into a [`crate::Config`].

use std::path::PathBuf;

use structopt::StructOpt;

use crate::config::{Config, DEFAULT_FRAGSIZE, DEFAULT_TMPDIR};

/// `nr [-v]* [-o OUT] [-n] [-f FRAGSIZE] [-r REJECTSIZE] [-d TMPDIR] FILE...`
#[derive(StructOpt, Debug)]
#[structopt(
    name = "nr",
    about = "Produce a non-redundant sequence set from FASTA-format input files"
)]
pub struct Options {
    /// Increase diagnostic verbosity. May be given more than once.
    #[structopt(short, parse(from_occurrences))]
    pub verbose: u8,

    /// Write the non-redundant set to FILE instead of stdout.
    #[structopt(short = "o", long = "out", value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Treat the first input file as already non-redundant: load it
    /// without running the redundancy probe against it.
    #[structopt(short = "n")]
    pub first_is_nr: bool,

    /// Fragment size used to build the representative-fragment index.
    #[structopt(short = "f", long = "fragsize", default_value = "15")]
    pub frag_size: usize,

    /// Sequences of this length or shorter are rejected at ingest.
    #[structopt(short = "r", long = "rejectsize")]
    pub reject_size: Option<usize>,

    /// Directory for the run's temporary stores. Overrides `NR_TMPDIR`.
    #[structopt(short = "d", long = "tmpdir", value_name = "DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Input FASTA files, processed in the order given.
    #[structopt(required = true, min_values = 1)]
    pub files: Vec<String>,
}

impl Options {
    /// Resolve the parsed arguments into a run [`Config`]. `-d` takes
    /// precedence over the `NR_TMPDIR` environment variable, which in turn
    /// takes precedence over the compiled-in default.
    pub fn to_config(&self) -> Config {
        let tmp_dir = self
            .tmp_dir
            .clone()
            .or_else(|| std::env::var_os("NR_TMPDIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TMPDIR));

        let frag_size = if self.frag_size == 0 {
            DEFAULT_FRAGSIZE
        } else {
            self.frag_size
        };

        Config {
            frag_size,
            reject_size: self.reject_size.unwrap_or(2 * frag_size),
            tmp_dir,
            verbosity: self.verbose,
            first_is_nr: self.first_is_nr,
        }
    }
}
