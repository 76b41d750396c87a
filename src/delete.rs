//! Deletion Manager (SPEC_FULL.md §4.F).
//!
//! Deletes cannot happen in place while a phase is enumerating `SeqStage`
//! or `SeqMain` (the `Store` trait does not guarantee delete-safe
//! iteration), so every drop is recorded in the `Deleted` marker store and
//! applied by [`purge`] once the enclosing phase's enumeration has
//! finished.

use crate::engine::EngineContext;
use crate::error::Result;

/// Mark `id` for deletion and immediately remove its fragment-index
/// bookkeeping (safe to do eagerly: `FragIndex`/`FragTable` are not being
/// enumerated by the caller of `drop_sequence`).
pub fn drop_sequence(ctx: &mut EngineContext, id: &str) -> Result<()> {
    ctx.deleted.replace(id.as_bytes(), b"1")?;

    if let Some(frag) = ctx.frag_table.fetch(id.as_bytes())? {
        ctx.frag_index.delete(&frag)?;
        ctx.frag_table.delete(id.as_bytes())?;
    }
    Ok(())
}

/// Apply every pending deletion to `SeqMain` and `SeqStage`, then clear the
/// marker store. Must run at every phase boundary (SPEC_FULL.md §4.F).
pub fn purge(ctx: &mut EngineContext) -> Result<()> {
    let mut cursor = ctx.deleted.first_key()?;
    while let Some(key) = cursor {
        ctx.seq_main.delete(&key)?;
        ctx.seq_stage.delete(&key)?;
        cursor = ctx.deleted.next_key(&key)?;
    }
    ctx.deleted.clear()
}
