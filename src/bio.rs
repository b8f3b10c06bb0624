//! Block I/O: bounded transfers inside one block of the backing file.
//!
//! Every call opens the backing file, seeks to the absolute byte of the
//! requested block, transfers, and closes the file again. The filesystem
//! keeps no long-lived descriptor.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::trace;

use crate::error::Result;

/// The virtual disk: a backing file divided into fixed-size blocks.
#[derive(Clone, Debug)]
pub(crate) struct Disk {
    path: PathBuf,
    block_size: u32,
    block_count: u32,
}

impl Disk {
    /// Describe an existing backing file. Geometry is trusted; `load`
    /// validates it against the file before handing it here.
    pub fn new(path: &Path, block_size: u32, block_count: u32) -> Disk {
        Disk {
            path: path.to_owned(),
            block_size,
            block_count,
        }
    }

    /// Create the backing file with exactly `block_size * block_count`
    /// bytes. Overwrites an existing file.
    pub fn create(path: &Path, block_size: u32, block_count: u32) -> Result<Disk> {
        let file = File::create(path)?;
        // Remove the partial image unless sizing succeeds.
        let file = scopeguard::guard(file, |_| {
            let _ = std::fs::remove_file(path);
        });
        file.set_len(u64::from(block_size) * u64::from(block_count))?;
        drop(scopeguard::ScopeGuard::into_inner(file));
        Ok(Disk::new(path, block_size, block_count))
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Write `buf` inside one block, `offset` bytes into it.
    pub fn write_in_block(&self, block: u32, offset: u32, buf: &[u8]) -> Result<()> {
        self.check_bounds(block, offset, buf.len());
        trace!("write {} bytes at block {} + {}", buf.len(), block, offset);
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        let _ = file.seek(SeekFrom::Start(self.byte_of(block, offset)))?;
        file.write_all(buf)?;
        Ok(())
    }

    /// Read `buf.len()` bytes from one block, `offset` bytes into it.
    pub fn read_in_block(&self, block: u32, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(block, offset, buf.len());
        trace!("read {} bytes at block {} + {}", buf.len(), block, offset);
        let mut file = File::open(&self.path)?;
        let _ = file.seek(SeekFrom::Start(self.byte_of(block, offset)))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn byte_of(&self, block: u32, offset: u32) -> u64 {
        u64::from(block) * u64::from(self.block_size) + u64::from(offset)
    }

    /// A transfer must lie entirely within one existing block.
    fn check_bounds(&self, block: u32, offset: u32, len: usize) {
        assert!(block < self.block_count, "block {} out of range", block);
        assert!(offset < self.block_size, "offset {} out of block", offset);
        assert!(
            offset as usize + len <= self.block_size as usize,
            "transfer of {} bytes at offset {} crosses a block boundary",
            len,
            offset
        );
    }
}
