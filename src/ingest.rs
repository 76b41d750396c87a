use std::fs::File;
use std::io::{BufRead, BufReader};

use log::{info, warn};

use crate::config::MAX_KEY_LEN;
use crate::error::Result;
use crate::locator::Locator;
use crate::store::Store;

/// Derive the canonical identifier from a FASTA header line (including its
/// leading `>` and trailing line terminator, if any).
///
/// - If the header has no `|`, the id is everything after `>`, capped at
///   `MAX_KEY_LEN - 1` characters.
/// - If the header starts with `>pdb`, the id is the text after the first
///   `|`, truncated to the database code plus one chain character after
///   the next `|` (dropping the trailing `|` if no chain follows).
/// - Otherwise the id is the text after the first `|`, truncated at the
///   next `|` if one is present.
///
/// This is a pure function, exposed directly for unit testing
/// (SPEC_FULL.md §9 re-architecture guidance).
pub fn canonical_id(header_line: &str) -> String {
    let trimmed = header_line.trim_end_matches(['\n', '\r'].as_ref());
    let without_gt = trimmed.get(1..).unwrap_or("");

    match trimmed.find('|') {
        Some(bar_pos) => {
            let rest = &trimmed[bar_pos + 1..];
            let mut key: String = rest.chars().take(MAX_KEY_LEN - 1).collect();

            if without_gt.starts_with("pdb") {
                if let Some(inner_bar) = key.find('|') {
                    let prefix = key[..inner_bar].to_string();
                    let chain = key[inner_bar + 1..].chars().next();
                    key = match chain {
                        Some(c) => format!("{}|{}", prefix, c),
                        None => prefix,
                    };
                }
            } else if let Some(inner_bar) = key.find('|') {
                key.truncate(inner_bar);
            }
            key
        }
        None => without_gt.chars().take(MAX_KEY_LEN - 1).collect(),
    }
}

/// Scan `path` sequentially, deriving a canonical id and locator for every
/// record, and stage surviving ones (body length `> reject_size`) into
/// `stage`. Duplicate ids within the file are reported and the later
/// record is ignored (first-wins). Returns the number of records staged.
pub fn ingest_file(path: &str, reject_size: usize, stage: &mut dyn Store) -> Result<usize> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut offset: u64 = 0;
    let mut current: Option<(String, u64, usize)> = None;
    let mut staged = 0usize;

    loop {
        let mut raw = Vec::new();
        let n = reader.read_until(b'\n', &mut raw)?;
        if n == 0 {
            break;
        }
        let line_start = offset;
        offset += n as u64;
        let line = String::from_utf8_lossy(&raw).into_owned();

        if line.starts_with('>') {
            if let Some((id, entry_start, body_len)) = current.take() {
                staged +=
                    finalize_record(path, &id, entry_start, body_len, reject_size, stage)? as usize;
            }
            current = Some((canonical_id(&line), line_start, 0));
        } else if let Some((_, _, body_len)) = current.as_mut() {
            *body_len += line.trim_end_matches(['\n', '\r'].as_ref()).len();
        }
    }

    if let Some((id, entry_start, body_len)) = current.take() {
        staged += finalize_record(path, &id, entry_start, body_len, reject_size, stage)? as usize;
    }

    Ok(staged)
}

fn finalize_record(
    path: &str,
    id: &str,
    entry_start: u64,
    body_len: usize,
    reject_size: usize,
    stage: &mut dyn Store,
) -> Result<bool> {
    if body_len <= reject_size {
        info!(
            "Sequence {} rejected. Only {} residues",
            id, body_len
        );
        return Ok(false);
    }

    let locator = Locator::new(path, entry_start);
    let value = locator.encode()?;
    if !stage.insert_unique(id.as_bytes(), &value)? {
        warn!("Duplicate ID: {}", id);
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogStore;
    use std::io::Write;

    #[test]
    fn plain_id_with_no_bar() {
        assert_eq!(canonical_id(">simple\n"), "simple");
    }

    #[test]
    fn generic_id_truncates_at_next_bar() {
        assert_eq!(canonical_id(">sp|P12345|NAME\n"), "P12345");
    }

    #[test]
    fn generic_id_with_single_bar_keeps_remainder() {
        assert_eq!(canonical_id(">sp|P12345\n"), "P12345");
    }

    #[test]
    fn pdb_id_keeps_code_and_chain() {
        assert_eq!(canonical_id(">pdb|1abc|A\n"), "1abc|A");
    }

    #[test]
    fn pdb_id_without_chain_drops_trailing_bar() {
        assert_eq!(canonical_id(">pdb|1abc|\n"), "1abc");
    }

    #[test]
    fn pdb_id_without_second_bar_is_unaffected() {
        assert_eq!(canonical_id(">pdb|1abc\n"), "1abc");
    }

    #[test]
    fn id_is_capped_at_max_key_len() {
        let long = "x".repeat(100);
        let header = format!(">{}\n", long);
        assert_eq!(canonical_id(&header).len(), MAX_KEY_LEN - 1);
    }

    #[test]
    fn ingest_stages_long_records_and_skips_short_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.faa");
        let mut f = File::create(&path).unwrap();
        write!(f, ">a|one\nABCDEF\n>b|two\nAB\n").unwrap();
        drop(f);

        let mut stage = LogStore::open(dir.path().join("stage")).unwrap();
        let staged = ingest_file(path.to_str().unwrap(), 3, &mut stage).unwrap();
        assert_eq!(staged, 1);
        assert!(stage.fetch(b"one").unwrap().is_some());
        assert!(stage.fetch(b"two").unwrap().is_none());
    }

    #[test]
    fn ingest_reports_duplicate_ids_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.faa");
        let mut f = File::create(&path).unwrap();
        write!(f, ">a|dup\nABCDEF\n>b|dup\nGHIJKL\n").unwrap();
        drop(f);

        let mut stage = LogStore::open(dir.path().join("stage")).unwrap();
        let staged = ingest_file(path.to_str().unwrap(), 3, &mut stage).unwrap();
        assert_eq!(staged, 1);
        let locator = Locator::decode(&stage.fetch(b"dup").unwrap().unwrap()).unwrap();
        assert_eq!(locator.offset, 0);
    }
}
