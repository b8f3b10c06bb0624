//! minifat: a miniature FAT-style filesystem kept inside one backing file.
//!
//! The backing file is split into `block_count` blocks of `block_size`
//! bytes each. Five layers, leaves first:
//!   + Block I/O: bounded transfers inside one block of the backing file.
//!   + Block map: per-block tags and the first-fit allocator.
//!   + Directory: the files and their metadata blocks.
//!   + Handles: open-file cursors, the single-writer rule, read and write.
//!   + Serializer: block 0 and per-file records, save and load.
//!
//! Block 0 always holds the filesystem metadata. Every file owns one
//! file-entry block for its record and an ordered list of data blocks for
//! its payload.
//!
//! ```no_run
//! use minifat::{FileSystem, OpenFlags};
//!
//! # fn main() -> minifat::Result<()> {
//! let mut fs = FileSystem::create("disk.img", 64, 16)?;
//! let h = fs.open("hello.txt", OpenFlags::O_WRONLY)?;
//! fs.write(h, b"hello")?;
//! fs.close(h)?;
//! fs.save()?;
//! # Ok(())
//! # }
//! ```
#![deny(unused_must_use)]
#![warn(rust_2018_idioms)]

mod bio;
mod error;
mod fcntl;
mod file;
mod fs;
mod param;

pub use error::{Error, Result};
pub use fcntl::OpenFlags;
pub use file::{File, Handle, SeekFrom};
pub use fs::{BlockTag, FileSystem};
pub use param::{MAX_FILENAME_LENGTH, MAX_FILE_BLOCK_COUNT};
