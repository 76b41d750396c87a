//! Redundancy Sweeper (SPEC_FULL.md §4.E) — the second full pass over the
//! staged sequences, performed after the Fragment Indexer has built a
//! representative-fragment index of the survivors from the first pass.

use log::info;

use crate::comparator::{compare, Verdict};
use crate::delete;
use crate::engine::EngineContext;
use crate::error::{NrError, Result};
use crate::fragment::{fragment_at, fragment_offsets};
use crate::locator::Locator;

/// Walk every id still present in `SeqStage` (ids already marked in
/// `Deleted` by the indexing phase are skipped) and look for a fragment
/// whose indexed owner makes this sequence, or the owner, provably
/// redundant.
pub fn sweep_staged_sequences(ctx: &mut EngineContext) -> Result<()> {
    let mut cursor = ctx.seq_stage.first_key()?;
    while let Some(id_bytes) = cursor {
        let next = ctx.seq_stage.next_key(&id_bytes)?;

        if ctx.deleted.fetch(&id_bytes)?.is_none() {
            sweep_one(ctx, &id_bytes)?;
        }

        cursor = next;
    }
    Ok(())
}

fn sweep_one(ctx: &mut EngineContext, id_bytes: &[u8]) -> Result<()> {
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

    let frag_size = ctx.config.frag_size;
    let frag_len = ctx.config.fragment_len();

    for offset in fragment_offsets(body.len(), frag_size) {
        let fragment = fragment_at(&body, offset, frag_len);

        let owner_bytes = match ctx.frag_index.fetch(fragment.as_bytes())? {
            Some(v) => v,
            None => continue,
        };
        if owner_bytes == id_bytes {
            continue;
        }
        let owner_id = String::from_utf8(owner_bytes.clone()).map_err(|_| NrError::UnexpectedRecord)?;

        if ctx.deleted.fetch(&owner_bytes)?.is_some() {
            continue;
        }

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

        match compare(&body, &id, &owner_body, &owner_id) {
            Verdict::Different => continue,
            Verdict::FirstSupersedes => {
                info!("{} supersedes {}", id, owner_id);
                delete::drop_sequence(ctx, &owner_id)?;
            }
            Verdict::SecondSupersedes => {
                info!("{} supersedes {}", owner_id, id);
                delete::drop_sequence(ctx, &id)?;
                return Ok(());
            }
        }
    }

    Ok(())
}
