use failure::Fail;
use std::io;

/// Error type covering everything that can go fatally wrong while
/// non-redundantising a sequence set.
///
/// Record-level problems (duplicate ids, short sequences, excess-X
/// rejection, fragment exhaustion) are *not* represented here: those are
/// logged via the `log` facade and the offending record is dropped in
/// place. Only conditions that should abort a file or the whole run reach
/// this type.
#[derive(Fail, Debug)]
pub enum NrError {
    /// An IO error. Wraps a `std::io::Error`.
    #[fail(display = "{}", _0)]
    Io(#[fail(cause)] io::Error),
    /// Serialization or deserialization error from a store's log entries.
    #[fail(display = "{}", _0)]
    Serde(#[fail(cause)] serde_json::Error),
    /// The on-disk sled store reported a failure.
    #[fail(display = "{}", _0)]
    Sled(#[fail(cause)] sled::Error),
    /// A store entry did not decode into the shape the caller expected.
    /// Indicates a corrupted store or a program bug.
    #[fail(display = "Unexpected record shape in store")]
    UnexpectedRecord,
    /// Error with a string message, used for usage/argument problems.
    #[fail(display = "{}", _0)]
    StringError(String),
}

impl From<io::Error> for NrError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for NrError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serde(error)
    }
}

impl From<sled::Error> for NrError {
    fn from(error: sled::Error) -> Self {
        Self::Sled(error)
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, NrError>;
