//! # nr
//!
//! Produce a non-redundant sequence set from one or more FASTA-format
//! input files: sequences that are an exact substring of another sequence
//! already seen are dropped from the output.

#[macro_use]
extern crate log;

pub mod cli;
pub mod comparator;
pub mod config;
mod delete;
pub mod engine;
pub mod error;
mod fetcher;
mod fragment;
mod index;
mod ingest;
pub mod locator;
pub mod store;
mod sweep;

pub use config::Config;
pub use engine::{run, EngineContext};
pub use error::{NrError, Result};
pub use locator::Locator;
