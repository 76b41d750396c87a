//! Batch Merger & Driver (SPEC_FULL.md §4.G) — sequences the phases per
//! input file and owns the five stores' lifecycle.

use std::io::Write;
use std::process;

use log::{info, warn};

use crate::config::Config;
use crate::delete;
use crate::error::Result;
use crate::fetcher::BodyFetcher;
use crate::index;
use crate::ingest;
use crate::locator::Locator;
use crate::store::{LogStore, Store};
use crate::sweep;

/// The five stores, the body fetcher, and the run configuration, owned
/// together for the lifetime of a run. Components C–F borrow this context
/// for the duration of a phase rather than holding their own store
/// handles (SPEC_FULL.md §3 "Ownership").
pub struct EngineContext {
    pub(crate) seq_main: Box<dyn Store>,
    pub(crate) seq_stage: Box<dyn Store>,
    pub(crate) frag_index: Box<dyn Store>,
    pub(crate) frag_table: Box<dyn Store>,
    pub(crate) deleted: Box<dyn Store>,
    pub(crate) fetcher: BodyFetcher,
    pub(crate) config: Config,
    closed: bool,
}

impl EngineContext {
    /// Open the five stores rooted at `config.tmp_dir`, each suffixed with
    /// the current process id so concurrent runs do not collide
    /// (SPEC_FULL.md §6 "On-disk temporary layout").
    pub fn open(config: Config) -> Result<Self> {
        let pid = process::id();
        let store_path = |stem: &str| config.tmp_dir.join(format!("{}.{}", stem, pid));

        Ok(Self {
            seq_main: Box::new(LogStore::open(store_path("seqmain"))?),
            seq_stage: Box::new(LogStore::open(store_path("seqstage"))?),
            frag_index: Box::new(LogStore::open(store_path("fragindex"))?),
            frag_table: Box::new(LogStore::open(store_path("fragtable"))?),
            deleted: Box::new(LogStore::open(store_path("deleted"))?),
            fetcher: BodyFetcher::new(),
            config,
            closed: false,
        })
    }

    /// Close every store, flushing and releasing resources. Safe to call
    /// more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.seq_main.close()?;
        self.seq_stage.close()?;
        self.frag_index.close()?;
        self.frag_table.close()?;
        self.deleted.close()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        // Best-effort cleanup mirroring the source's explicit
        // flush-before-drop discipline (kvs.rs compact()): an early
        // return through `?` must not leave store files dangling.
        let _ = self.close();
    }
}

/// Process one input file through ingestion, indexing, (optionally)
/// sweeping, and merging into `SeqMain` (SPEC_FULL.md §4.G, the per-file
/// state machine).
pub fn process_file(ctx: &mut EngineContext, file: &str, load_only: bool) -> Result<()> {
    info!("NON-REDUNDANTISING {}", file);

    let reject_size = ctx.config.reject_size;
    match ingest::ingest_file(file, reject_size, ctx.seq_stage.as_mut()) {
        Ok(n) => info!("Staged {} candidate sequences from {}", n, file),
        Err(e) => {
            warn!("Can't read {}: {}", file, e);
            return Ok(());
        }
    }

    index::index_staged_sequences(ctx, load_only)?;
    delete::purge(ctx)?;

    if !load_only {
        sweep::sweep_staged_sequences(ctx)?;
        delete::purge(ctx)?;
    }

    merge_staged_into_main(ctx)
}

/// Copy every surviving `SeqStage` entry into `SeqMain` (insert-no-overwrite,
/// warning on a cross-file id collision), then clear `SeqStage`.
fn merge_staged_into_main(ctx: &mut EngineContext) -> Result<()> {
    let mut cursor = ctx.seq_stage.first_key()?;
    while let Some(key) = cursor {
        let next = ctx.seq_stage.next_key(&key)?;
        if let Some(value) = ctx.seq_stage.fetch(&key)? {
            if !ctx.seq_main.insert_unique(&key, &value)? {
                let id = String::from_utf8_lossy(&key).into_owned();
                warn!("Duplicate ID: {}", id);
            }
        }
        cursor = next;
    }
    ctx.seq_stage.clear()
}

/// Run the whole pipeline over `files`, writing the final non-redundant
/// set to `out`. The first file is treated as load-only when
/// `config.first_is_nr` is set (SPEC_FULL.md §6 `-n`).
pub fn run(config: Config, files: &[String], out: &mut dyn Write) -> Result<()> {
    let mut ctx = EngineContext::open(config)?;

    for (i, file) in files.iter().enumerate() {
        let load_only = i == 0 && ctx.config.first_is_nr;
        process_file(&mut ctx, file, load_only)?;
    }

    write_results(&mut ctx, out)?;
    ctx.close()
}

fn write_results(ctx: &mut EngineContext, out: &mut dyn Write) -> Result<()> {
    let mut cursor = ctx.seq_main.first_key()?;
    while let Some(key) = cursor {
        let next = ctx.seq_main.next_key(&key)?;
        if let Some(value) = ctx.seq_main.fetch(&key)? {
            let locator = Locator::decode(&value)?;
            if let Some(entry) = ctx.fetcher.fetch(&locator, true)? {
                out.write_all(entry.as_bytes())?;
            }
        }
        cursor = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn surviving_ids(files: &[&std::path::Path], config: Config) -> Vec<String> {
        let files: Vec<String> = files.iter().map(|p| p.to_str().unwrap().to_string()).collect();
        let mut out = Vec::new();
        run(config, &files, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut ids: Vec<String> = text
            .lines()
            .filter(|l| l.starts_with('>'))
            .map(|l| l.trim_start_matches('>').to_string())
            .collect();
        ids.sort();
        ids
    }

    fn config_in(dir: &std::path::Path, frag_size: usize, reject_size: usize) -> Config {
        Config {
            frag_size,
            reject_size,
            tmp_dir: dir.to_path_buf(),
            verbosity: 0,
            first_is_nr: false,
        }
    }

    #[test]
    fn subset_is_eliminated_in_favour_of_the_longer_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.faa");
        fs::write(&input, ">a\nABCDEF\n>b\nXABCDEFY\n").unwrap();

        let ids = surviving_ids(&[&input], config_in(dir.path(), 4, 3));
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[test]
    fn three_identical_bodies_leave_the_greatest_id() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.faa");
        fs::write(&input, ">a\nABCDE\n>b\nABCDE\n>c\nABCDE\n").unwrap();

        let ids = surviving_ids(&[&input], config_in(dir.path(), 3, 2));
        assert_eq!(ids, vec!["c".to_string()]);
    }

    #[test]
    fn unreadable_file_is_skipped_and_run_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.faa");
        let present = dir.path().join("in.faa");
        fs::write(&present, ">a\nABCDEFGH\n").unwrap();

        let ids = surviving_ids(
            &[&missing, &present],
            config_in(dir.path(), 4, 3),
        );
        assert_eq!(ids, vec!["a".to_string()]);
    }
}
