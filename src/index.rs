//! Fragment Indexer (SPEC_FULL.md §4.D).

use log::{info, trace, warn};

use crate::comparator::{compare, Verdict};
use crate::delete;
use crate::engine::EngineContext;
use crate::error::{NrError, Result};
use crate::fragment::{fragment_at, fragment_offsets, too_many_xs};
use crate::locator::Locator;

/// Index every id currently in `SeqStage`, either registering a
/// representative fragment for it or dropping it as redundant / excess-X /
/// unindexable. `load_only` disables the redundancy probe on
/// fragment-exhaustion (SPEC_FULL.md Open Question 4).
///
/// Ids are visited in descending order. With a group of identical bodies
/// sharing the same small set of available fragment windows, the
/// unconditional drop on exhaustion (Open Question 2) always eliminates
/// whichever id is visited last; descending order means that's the
/// lexicographically smallest of the group, leaving the Redundancy Sweeper
/// to correctly promote the greatest id among whatever survives indexing.
pub fn index_staged_sequences(ctx: &mut EngineContext, load_only: bool) -> Result<()> {
    let mut ids = Vec::new();
    let mut cursor = ctx.seq_stage.first_key()?;
    while let Some(id_bytes) = cursor {
        cursor = ctx.seq_stage.next_key(&id_bytes)?;
        ids.push(id_bytes);
    }

    for id_bytes in ids.into_iter().rev() {
        index_one(ctx, &id_bytes, load_only)?;
    }
    Ok(())
}

fn index_one(ctx: &mut EngineContext, id_bytes: &[u8], load_only: bool) -> Result<()> {
    let id = String::from_utf8(id_bytes.to_vec()).map_err(|_| NrError::UnexpectedRecord)?;

    let locator_bytes = match ctx.seq_stage.fetch(id_bytes)? {
        Some(v) => v,
        None => return Ok(()),
    };
    let locator = Locator::decode(&locator_bytes)?;
    let body = match ctx.fetcher.fetch(&locator, false)? {
        Some(b) => b,
        None => return Ok(()),
    };

    if too_many_xs(&body) {
        warn!("Too many Xs in sequence {}", id);
        return delete::drop_sequence(ctx, &id);
    }

    let frag_size = ctx.config.frag_size;
    let frag_len = ctx.config.fragment_len();
    let mut got_x = false;
    let mut got_no_x = false;

    for offset in fragment_offsets(body.len(), frag_size) {
        let fragment = fragment_at(&body, offset, frag_len);
        if fragment.contains('X') {
            got_x = true;
            continue;
        }
        got_no_x = true;
        if ctx.frag_index.insert_unique(fragment.as_bytes(), id_bytes)? {
            ctx.frag_table.insert_unique(id_bytes, fragment.as_bytes())?;
            return Ok(());
        }
    }

    if load_only {
        trace_fragment_collisions(ctx, &body, frag_size, frag_len)?;
        warn!(
            "Can't find unique fragment. Unable to store {} (length={})",
            id,
            body.len()
        );
        delete::drop_sequence(ctx, &id)?;
        return Ok(());
    }

    match redundancy_probe(ctx, &id, &body, frag_size, frag_len)? {
        Some(parent) => info!("{} supersedes {}", parent, id),
        None if got_x && !got_no_x => {
            warn!(
                "No fragment without X for sequence {} (length={})",
                id,
                body.len()
            );
        }
        None => {
            warn!(
                "Can't find unique fragment. Unable to store {} (length={})",
                id,
                body.len()
            );
        }
    }

    delete::drop_sequence(ctx, &id)
}

/// At the highest verbosity, re-walk the same fragment windows just
/// exhausted and report which id already owns each one, so a user chasing
/// a load-only rejection can see exactly what collided.
fn trace_fragment_collisions(
    ctx: &mut EngineContext,
    body: &str,
    frag_size: usize,
    frag_len: usize,
) -> Result<()> {
    for offset in fragment_offsets(body.len(), frag_size) {
        let fragment = fragment_at(body, offset, frag_len);
        if fragment.contains('X') {
            continue;
        }
        if let Some(owner_bytes) = ctx.frag_index.fetch(fragment.as_bytes())? {
            let owner_id = String::from_utf8(owner_bytes).map_err(|_| NrError::UnexpectedRecord)?;
            trace!("Hit with: {}", owner_id);
        }
    }
    Ok(())
}

/// Re-scan `body`'s fragments looking for one whose current `FragIndex`
/// owner is either byte-identical to `body` (equality, either tie-break
/// direction) or a strict superset of it. Both count as "found a parent"
/// per SPEC_FULL.md §4.D, even though the caller drops `id` unconditionally
/// either way (Open Question 2) — the distinction only affects logging.
fn redundancy_probe(
    ctx: &mut EngineContext,
    id: &str,
    body: &str,
    frag_size: usize,
    frag_len: usize,
) -> Result<Option<String>> {
    for offset in fragment_offsets(body.len(), frag_size) {
        let fragment = fragment_at(body, offset, frag_len);
        if fragment.contains('X') {
            continue;
        }

        let owner_bytes = match ctx.frag_index.fetch(fragment.as_bytes())? {
            Some(v) => v,
            None => continue,
        };
        let owner_id = String::from_utf8(owner_bytes.clone()).map_err(|_| NrError::UnexpectedRecord)?;

        let owner_locator_bytes = match ctx.seq_stage.fetch(&owner_bytes)? {
            Some(v) => Some(v),
            None => ctx.seq_main.fetch(&owner_bytes)?,
        };
        let owner_locator_bytes = match owner_locator_bytes {
            Some(v) => v,
            None => continue,
        };
        let owner_locator = Locator::decode(&owner_locator_bytes)?;
        let owner_body = match ctx.fetcher.fetch(&owner_locator, false)? {
            Some(b) => b,
            None => continue,
        };

        let verdict = compare(body, id, &owner_body, &owner_id);
        let is_match = match verdict {
            Verdict::Different => false,
            Verdict::SecondSupersedes => true,
            Verdict::FirstSupersedes => owner_body.len() == body.len(),
        };
        if is_match {
            return Ok(Some(owner_id));
        }
    }
    Ok(None)
}
