use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use crate::error::Result;
use crate::locator::Locator;

/// Resolves a [`Locator`] to an in-memory sequence body on demand.
///
/// Caches a single open file handle, reopening only when the requested
/// filename differs from the cached one — an optimization for the common
/// case of repeated fetches against the same input file, not a contract
/// (SPEC_FULL.md §4.A).
#[derive(Default)]
pub struct BodyFetcher {
    cached: Option<(String, BufReader<File>)>,
}

impl BodyFetcher {
    /// A fetcher with no file currently open.
    pub fn new() -> Self {
        Self { cached: None }
    }

    /// Fetch the body at `locator`. When `with_header` is true, the header
    /// line is included verbatim (terminators kept); otherwise the header
    /// is skipped and body line terminators are stripped. Returns `None`
    /// if the file cannot be opened, the offset cannot be seeked, or the
    /// resulting content is empty.
    pub fn fetch(&mut self, locator: &Locator, with_header: bool) -> Result<Option<String>> {
        if !self.ensure_open(&locator.file)? {
            return Ok(None);
        }
        let reader = &mut self.cached.as_mut().expect("just opened").1;
        if reader.seek(SeekFrom::Start(locator.offset)).is_err() {
            return Ok(None);
        }

        if !with_header {
            let mut header = String::new();
            if reader.read_line(&mut header)? == 0 {
                return Ok(None);
            }
        }

        let mut body = String::new();
        let mut got_any = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if got_any && line.starts_with('>') {
                break;
            }
            got_any = true;
            if with_header {
                body.push_str(&line);
            } else {
                body.push_str(line.trim_end_matches(['\n', '\r'].as_ref()));
            }
        }

        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }

    fn ensure_open(&mut self, filename: &str) -> Result<bool> {
        let needs_reopen = match &self.cached {
            Some((name, _)) => name != filename,
            None => true,
        };
        if needs_reopen {
            match File::open(filename) {
                Ok(file) => self.cached = Some((filename.to_string(), BufReader::new(file))),
                Err(_) => {
                    self.cached = None;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
