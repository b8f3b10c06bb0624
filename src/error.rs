use std::fmt;
use std::io;

/// Engine errors. Byte counts are not errors: short reads and writes
/// report how many bytes were transferred instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// Named file absent on a read-mode open or a delete.
    NotFound,
    /// A file with this name already exists.
    DuplicateName,
    /// Name too long for the name limit or for this disk geometry.
    NameTooLong,
    /// A write handle is already open on this file.
    WriteConflict,
    /// No empty block left on the disk.
    Full,
    /// Delete attempted while handles are open.
    Busy,
    /// Seek target outside `[0, size]`.
    OutOfRange,
    /// The handle is not currently open.
    BadHandle,
    /// Bad caller-supplied parameter.
    InvalidArgument,
    /// The on-disk image does not describe a valid filesystem.
    Corrupted(&'static str),
    /// The backing file could not be read or written.
    Io(io::ErrorKind),
}

impl Error {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "no such file",
            Self::DuplicateName => "file already exists",
            Self::NameTooLong => "file name too long for this disk geometry",
            Self::WriteConflict => "file already has a write handle",
            Self::Full => "filesystem is full",
            Self::Busy => "file has open handles",
            Self::OutOfRange => "seek target outside the file",
            Self::BadHandle => "handle is not open",
            Self::InvalidArgument => "invalid argument",
            Self::Corrupted(why) => why,
            Self::Io(_) => "backing file I/O failed",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "backing file I/O failed: {:?}", kind),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err.kind())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
