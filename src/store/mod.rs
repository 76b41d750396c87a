//! A single ordered key/value store interface with two interchangeable
//! backends (`log_store`, `sled_store`). The engine opens five instances of
//! this trait — one per store named in SPEC_FULL.md §3 — rather than five
//! distinct concrete types.

mod log_store;
mod sled_store;

pub use log_store::LogStore;
pub use sled_store::SledStore;

use crate::error::Result;

/// Ordered key/value store with deferred-delete-safe enumeration.
///
/// Implementations must keep `first_key`/`next_key` consistent with some
/// total order over keys so callers can walk the whole store with repeated
/// `next_key` calls. Deleting a key while iterating over it is explicitly
/// *not* required to be safe; callers that need that (the redundancy
/// engine) record pending deletions in a separate `Deleted` store and
/// apply them between phases instead (SPEC_FULL.md §4.F).
pub trait Store {
    /// Insert `value` under `key` only if `key` is absent. Returns whether
    /// the insert happened.
    fn insert_unique(&mut self, key: &[u8], value: &[u8]) -> Result<bool>;

    /// Insert or overwrite `value` under `key`.
    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Look up `key`, returning its value if present.
    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove `key` if present; a no-op if it is already absent.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// The first key in enumeration order, if the store is non-empty.
    fn first_key(&mut self) -> Result<Option<Vec<u8>>>;

    /// The key immediately following `key` in enumeration order, if any.
    fn next_key(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove every entry, leaving the store empty but open.
    fn clear(&mut self) -> Result<()>;

    /// Flush, then unlink the on-disk path backing this store entirely
    /// (SPEC_FULL.md §4.B, "Stores are unlinked on clean exit"). Idempotent:
    /// calling twice, or on an already-removed path, is not an error.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Runs the same operation sequence against any `Store` impl and
    /// asserts identical observable state, proving the trait abstraction
    /// holds across backends (SPEC_FULL.md §8, "Backend interchangeability").
    fn exercise(mut store: impl Store) {
        assert!(store.insert_unique(b"a", b"1").unwrap());
        assert!(!store.insert_unique(b"a", b"2").unwrap());
        assert_eq!(store.fetch(b"a").unwrap(), Some(b"1".to_vec()));

        store.replace(b"a", b"9").unwrap();
        assert_eq!(store.fetch(b"a").unwrap(), Some(b"9".to_vec()));

        assert!(store.insert_unique(b"b", b"2").unwrap());
        assert!(store.insert_unique(b"c", b"3").unwrap());

        let mut seen = Vec::new();
        let mut cursor = store.first_key().unwrap();
        while let Some(key) = cursor {
            seen.push(key.clone());
            cursor = store.next_key(&key).unwrap();
        }
        seen.sort();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        store.delete(b"b").unwrap();
        assert_eq!(store.fetch(b"b").unwrap(), None);

        store.clear().unwrap();
        assert_eq!(store.first_key().unwrap(), None);

        store.close().unwrap();
    }

    #[test]
    fn log_store_satisfies_the_contract() {
        let dir = tempdir().unwrap();
        let store = LogStore::open(dir.path().join("t")).unwrap();
        exercise(store);
    }

    #[test]
    fn sled_store_satisfies_the_contract() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path().join("t")).unwrap();
        exercise(store);
    }
}
