use std::collections::{BTreeMap, Bound, HashMap};
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use super::Store;
use crate::error::Result;

const COMPACTION_THRESHOLD: u64 = 1024;

/// An append-log key/value store with an in-memory ordered index.
///
/// Keys and values are arbitrary byte strings. Writes are appended to a
/// generation-numbered log file; a `BTreeMap` index keeps the position of
/// the most recent entry for each key so `first_key`/`next_key` enumerate
/// in byte-lexicographic order without touching disk. This is the default
/// backend wired into the `nr` binary and the closest in spirit to the
/// original system's embedded-database stores.
pub struct LogStore {
    path: PathBuf,
    writer: BufWriterWithPos<File>,
    readers: HashMap<u64, BufReaderWithPos<File>>,
    index: BTreeMap<Vec<u8>, EntryPos>,
    uncompacted: u64,
    current_gen: u64,
}

impl LogStore {
    /// Open (creating if absent) a store rooted at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;

        let gen_list = sorted_gen_list(&path)?;
        let mut uncompacted = 0;
        let mut index = BTreeMap::new();
        let mut readers = HashMap::new();

        for &gen in &gen_list {
            let mut reader = BufReaderWithPos::new(File::open(log_path(&path, gen))?)?;
            uncompacted += load(gen, &mut reader, &mut index)?;
            readers.insert(gen, reader);
        }

        let current_gen = gen_list.last().unwrap_or(&0) + 1;
        let writer = new_log_file(&path, current_gen, &mut readers)?;

        Ok(Self {
            path,
            writer,
            readers,
            index,
            uncompacted,
            current_gen,
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let command = Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        let pos = self.writer.pos;
        serde_json::to_writer(&mut self.writer, &command)?;
        self.writer.flush()?;
        if let Some(old) = self
            .index
            .insert(key.to_vec(), (self.current_gen, pos..self.writer.pos).into())
        {
            self.uncompacted += old.len;
        }

        if self.uncompacted > COMPACTION_THRESHOLD {
            self.compact()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let compaction_gen = self.current_gen + 1;
        self.current_gen += 2;

        self.writer = self.new_log_file(self.current_gen)?;
        let mut compaction_writer = self.new_log_file(compaction_gen)?;

        let mut new_pos = 0;
        for entry_pos in &mut self.index.values_mut() {
            let reader = self
                .readers
                .get_mut(&entry_pos.gen)
                .expect("Cannot find log reader");
            if reader.pos != entry_pos.pos {
                reader.seek(SeekFrom::Start(entry_pos.pos))?;
            }

            let mut entry_reader = reader.take(entry_pos.len);
            let len = io::copy(&mut entry_reader, &mut compaction_writer)?;
            *entry_pos = (compaction_gen, new_pos..new_pos + len).into();
            new_pos += len;
        }
        compaction_writer.flush()?;

        let stale_gens: Vec<_> = self
            .readers
            .keys()
            .filter(|&&gen| gen < compaction_gen)
            .cloned()
            .collect();
        for stale_gen in stale_gens {
            self.readers.remove(&stale_gen);
            fs::remove_file(log_path(&self.path, stale_gen))?;
        }

        self.uncompacted = 0;
        Ok(())
    }

    fn new_log_file(&mut self, gen: u64) -> Result<BufWriterWithPos<File>> {
        new_log_file(&self.path, gen, &mut self.readers)
    }
}

impl Store for LogStore {
    fn insert_unique(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        if self.index.contains_key(key) {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.set(key, value)
    }

    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let entry_pos = match self.index.get(key) {
            Some(entry_pos) => *entry_pos,
            None => return Ok(None),
        };
        let reader = self
            .readers
            .get_mut(&entry_pos.gen)
            .expect("Cannot find log reader");
        reader.seek(SeekFrom::Start(entry_pos.pos))?;
        let cmd_reader = reader.take(entry_pos.len);
        match serde_json::from_reader(cmd_reader)? {
            Command::Set { value, .. } => Ok(Some(value)),
            Command::Remove { .. } => Ok(None),
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        if !self.index.contains_key(key) {
            return Ok(());
        }
        let command = Command::Remove { key: key.to_vec() };
        serde_json::to_writer(&mut self.writer, &command)?;
        self.writer.flush()?;
        if let Some(old) = self.index.remove(key) {
            self.uncompacted += old.len;
        }
        Ok(())
    }

    fn first_key(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.index.keys().next().cloned())
    }

    fn next_key(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .index
            .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone()))
    }

    fn clear(&mut self) -> Result<()> {
        self.readers.clear();
        for gen in sorted_gen_list(&self.path)? {
            let _ = fs::remove_file(log_path(&self.path, gen));
        }
        self.index.clear();
        self.uncompacted = 0;
        self.current_gen = 1;
        self.writer = new_log_file(&self.path, self.current_gen, &mut self.readers)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.readers.clear();
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Log-entry shape for a single store mutation.
#[derive(Serialize, Deserialize, Debug)]
enum Command {
    Set { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

/// Where a command lives: which generation file, and the byte range.
#[derive(Clone, Copy)]
struct EntryPos {
    gen: u64,
    pos: u64,
    len: u64,
}

impl From<(u64, Range<u64>)> for EntryPos {
    fn from((gen, range): (u64, Range<u64>)) -> Self {
        Self {
            gen,
            pos: range.start,
            len: range.end - range.start,
        }
    }
}

struct BufReaderWithPos<R: Read + Seek> {
    reader: BufReader<R>,
    pos: u64,
}

impl<R: Read + Seek> BufReaderWithPos<R> {
    fn new(mut inner: R) -> Result<Self> {
        let pos = inner.seek(SeekFrom::Current(0))?;
        Ok(Self {
            reader: BufReader::new(inner),
            pos,
        })
    }
}

impl<R: Read + Seek> Read for BufReaderWithPos<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.reader.read(buf)?;
        self.pos += len as u64;
        Ok(len)
    }
}

impl<R: Read + Seek> Seek for BufReaderWithPos<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.reader.seek(pos)?;
        Ok(self.pos)
    }
}

struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    fn new(mut inner: W) -> Result<Self> {
        let pos = inner.seek(SeekFrom::Current(0))?;
        Ok(Self {
            writer: BufWriter::new(inner),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> Seek for BufWriterWithPos<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.writer.seek(pos)?;
        Ok(self.pos)
    }
}

fn sorted_gen_list(path: &Path) -> Result<Vec<u64>> {
    let mut gen_list: Vec<u64> = fs::read_dir(path)?
        .flat_map(|res| -> Result<_> { Ok(res?.path()) })
        .filter(|path| path.is_file() && path.extension() == Some(OsStr::new("log")))
        .flat_map(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .map(|s| s.trim_end_matches(".log"))
                .map(str::parse::<u64>)
        })
        .flatten()
        .collect();
    gen_list.sort_unstable();
    Ok(gen_list)
}

fn log_path(dir: &Path, gen: u64) -> PathBuf {
    dir.join(format!("{}.log", gen))
}

fn new_log_file(
    path: &Path,
    gen: u64,
    readers: &mut HashMap<u64, BufReaderWithPos<File>>,
) -> Result<BufWriterWithPos<File>> {
    let path = log_path(path, gen);
    let writer = BufWriterWithPos::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(true)
            .open(&path)?,
    )?;
    readers.insert(gen, BufReaderWithPos::new(File::open(&path)?)?);
    Ok(writer)
}

fn load(
    gen: u64,
    reader: &mut BufReaderWithPos<File>,
    index: &mut BTreeMap<Vec<u8>, EntryPos>,
) -> Result<u64> {
    let mut uncompacted = 0;
    let mut pos = reader.seek(SeekFrom::Start(0))?;
    let mut stream = Deserializer::from_reader(reader).into_iter::<Command>();

    while let Some(cmd) = stream.next() {
        let new_pos = stream.byte_offset() as u64;
        match cmd? {
            Command::Set { key, .. } => {
                if let Some(old) = index.insert(key, (gen, pos..new_pos).into()) {
                    uncompacted += old.len;
                }
            }
            Command::Remove { key } => {
                if let Some(old) = index.remove(&key) {
                    uncompacted += old.len;
                }
                uncompacted += new_pos - pos;
            }
        }
        pos = new_pos;
    }

    Ok(uncompacted)
}
