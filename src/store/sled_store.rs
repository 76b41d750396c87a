use std::fs;
use std::io;
use std::ops::Bound;
use std::path::PathBuf;

use sled::Db;

use super::Store;
use crate::error::Result;

/// A `Store` backed by `sled`'s ordered `Db`. Kept as a second backend to
/// prove the `Store` trait is genuinely an abstraction and not a thin
/// wrapper that only the log engine can satisfy (SPEC_FULL.md §4.B,
/// "Backend interchangeability").
pub struct SledStore {
    path: PathBuf,
    db: Db,
}

impl SledStore {
    /// Open (creating if absent) a sled database rooted at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Ok(Self {
            db: sled::open(&path)?,
            path,
        })
    }
}

impl Store for SledStore {
    fn insert_unique(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        let inserted = self
            .db
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
            .is_ok();
        Ok(inserted)
    }

    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .db
            .get(key)?
            .map(|ivec| AsRef::<[u8]>::as_ref(&ivec).to_vec()))
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    fn first_key(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .db
            .iter()
            .keys()
            .next()
            .transpose()?
            .map(|ivec| AsRef::<[u8]>::as_ref(&ivec).to_vec()))
    }

    fn next_key(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .db
            .range::<&[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .keys()
            .next()
            .transpose()?
            .map(|ivec| AsRef::<[u8]>::as_ref(&ivec).to_vec()))
    }

    fn clear(&mut self) -> Result<()> {
        self.db.clear()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.db.flush()?;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
