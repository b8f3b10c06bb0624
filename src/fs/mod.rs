//! The filesystem structure: block map and allocator, the directory of
//! files, and the serializer that persists both.
//!
//! Disk layout:
//! [ metadata block 0 | file-entry and file-data blocks, first-fit ]
//!
//! Block 0 records the geometry and the block map. Each file's record
//! lives in its own file-entry block; payload blocks are written in place
//! by the write path and are never rewritten by `save`.

use std::fmt;
use std::io::Read;
use std::path::Path;

use arrayvec::ArrayString;
use itertools::Itertools;
use log::{debug, warn};

use crate::bio::Disk;
use crate::error::{Error, Result};
use crate::file::{block_index, byte_index, File};
use crate::param::MAX_FILENAME_LENGTH;

mod dentry;
mod superblock;

pub use superblock::BlockTag;

use dentry::Dentry;
use superblock::{Superblock, SB_SIZE};

/// A miniature FAT-style filesystem over one backing file.
///
/// Plain owned state: every operation takes the filesystem explicitly,
/// and callers that need concurrency must serialize outside.
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) disk: Disk,
    pub(crate) block_map: Vec<BlockTag>,
    pub(crate) files: Vec<File>,
    pub(crate) next_handle: u64,
}

impl FileSystem {
    /// Create a fresh filesystem, backed by a file of exactly
    /// `block_size * block_count` bytes. Overwrites an existing file.
    ///
    /// `block_size` must leave room for block 0's record: 8 bytes of
    /// geometry plus one tag byte per block.
    pub fn create(path: impl AsRef<Path>, block_size: u32, block_count: u32) -> Result<FileSystem> {
        let path = path.as_ref();
        if block_size == 0 || block_count == 0 {
            return Err(Error::InvalidArgument);
        }
        if u64::from(block_size) < SB_SIZE as u64 + u64::from(block_count) {
            return Err(Error::InvalidArgument);
        }

        let disk = Disk::create(path, block_size, block_count)?;
        let mut block_map = vec![BlockTag::Empty; block_count as usize];
        block_map[0] = BlockTag::Metadata;
        debug!(
            "created {:?}: {} blocks of {} bytes",
            path, block_count, block_size
        );
        Ok(FileSystem {
            disk,
            block_map,
            files: Vec::new(),
            next_handle: 0,
        })
    }

    /// Reload a filesystem image saved earlier.
    pub fn load(path: impl AsRef<Path>) -> Result<FileSystem> {
        let path = path.as_ref();
        let mut backing = std::fs::File::open(path)?;

        let mut header = [0u8; SB_SIZE];
        backing.read_exact(&mut header)?;
        let sb = Superblock::decode(&header)?;
        let (block_count, block_size) = (sb.block_count(), sb.block_size());
        if block_count == 0
            || block_size == 0
            || u64::from(block_size) < SB_SIZE as u64 + u64::from(block_count)
        {
            return Err(Error::Corrupted("geometry does not fit its metadata block"));
        }
        if backing.metadata()?.len() != u64::from(block_size) * u64::from(block_count) {
            return Err(Error::Corrupted("backing file length does not match geometry"));
        }

        let mut tags = vec![0u8; block_count as usize];
        backing.read_exact(&mut tags)?;
        drop(backing);
        let block_map = superblock::decode_map(&tags)?;
        if block_map[0] != BlockTag::Metadata {
            return Err(Error::Corrupted("block 0 is not the metadata block"));
        }

        let disk = Disk::new(path, block_size, block_count);
        let mut files = Vec::new();
        let mut record = vec![0u8; block_size as usize];
        for (i, tag) in block_map.iter().enumerate() {
            if *tag != BlockTag::FileEntry {
                continue;
            }
            disk.read_in_block(i as u32, 0, &mut record)?;
            let entry = Dentry::decode(&record)?;
            if entry.blocks.iter().any(|b| *b >= block_count) {
                return Err(Error::Corrupted("data block id out of range"));
            }
            files.push(File::from_parts(entry.name, entry.size, i as u32, entry.blocks));
        }

        debug!("loaded {:?}: {} files", path, files.len());
        Ok(FileSystem {
            disk,
            block_map,
            files,
            next_handle: 0,
        })
    }

    /// Persist filesystem and file metadata into the backing file.
    ///
    /// Payload bytes are untouched; the write path placed them already.
    /// Records left behind in freed blocks are not erased, the block map
    /// marks them unallocated.
    pub fn save(&self) -> Result<()> {
        let sb = Superblock::new(self.disk.block_count(), self.disk.block_size());
        self.disk.write_in_block(0, 0, &sb.encode(&self.block_map))?;
        for file in &self.files {
            self.disk
                .write_in_block(file.metadata_block(), 0, &Dentry::from_file(file).encode())?;
        }
        debug!("saved {} files", self.files.len());
        Ok(())
    }

    /// Print the filesystem state to standard output.
    pub fn dump(&self) {
        println!("{}", self);
    }

    /// First empty block, scanning up from block 0.
    pub fn find_empty_block(&self) -> Option<u32> {
        self.block_map
            .iter()
            .position(|tag| *tag == BlockTag::Empty)
            .map(|at| at as u32)
    }

    /// Claim the first empty block for `tag`.
    pub fn allocate_new_block(&mut self, tag: BlockTag) -> Result<u32> {
        alloc_block(&mut self.block_map, tag).ok_or(Error::Full)
    }

    fn free_block(&mut self, block: u32) {
        self.block_map[block as usize] = BlockTag::Empty;
    }

    /// Create an empty file named `name`.
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        if !name.is_ascii() {
            return Err(Error::InvalidArgument);
        }
        if name.len() >= MAX_FILENAME_LENGTH
            || dentry::record_len(name.len()) > self.disk.block_size() as usize
        {
            return Err(Error::NameTooLong);
        }
        if self.find_file(name).is_some() {
            return Err(Error::DuplicateName);
        }

        let stored = ArrayString::from(name).map_err(|_| Error::NameTooLong)?;
        let meta = self.allocate_new_block(BlockTag::FileEntry)?;
        self.files.push(File::new(stored, meta));
        debug!("created file {:?}, metadata block {}", name, meta);
        Ok(())
    }

    /// Size of `name` in bytes, or 0 when no such file exists.
    pub fn file_size(&self, name: &str) -> u32 {
        match self.find_file(name) {
            Some(file) => file.size(),
            None => {
                debug!("file {:?} does not exist", name);
                0
            }
        }
    }

    /// Delete `name`, reclaiming its metadata and data blocks.
    ///
    /// A file with open handles cannot be deleted. Freed blocks keep
    /// their stale bytes; the block map alone marks them unallocated.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let at = self
            .files
            .iter()
            .position(|file| file.name() == name)
            .ok_or(Error::NotFound)?;
        if !self.files[at].open_handles.is_empty() {
            return Err(Error::Busy);
        }

        let file = self.files.remove(at);
        self.free_block(file.metadata_block());
        for block in file.blocks() {
            self.free_block(*block);
        }
        debug!("deleted {:?}, reclaimed {} blocks", name, 1 + file.blocks().len());
        Ok(())
    }

    /// Files currently in the directory.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// Per-block classification map.
    pub fn block_map(&self) -> &[BlockTag] {
        &self.block_map
    }

    pub fn block_size(&self) -> u32 {
        self.disk.block_size()
    }

    pub fn block_count(&self) -> u32 {
        self.disk.block_count()
    }

    /// Exact byte-wise lookup over the directory.
    pub(crate) fn find_file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|file| file.name() == name)
    }

    pub(crate) fn file_by_meta_mut(&mut self, meta: u32) -> Option<&mut File> {
        self.files
            .iter_mut()
            .find(|file| file.metadata_block() == meta)
    }
}

/// First-fit allocation on a block map. Block 0 is tagged at creation and
/// is never handed out.
pub(crate) fn alloc_block(map: &mut [BlockTag], tag: BlockTag) -> Option<u32> {
    match map.iter().position(|t| *t == BlockTag::Empty) {
        Some(at) => {
            map[at] = tag;
            Some(at as u32)
        }
        None => {
            warn!("cannot allocate block: filesystem is full");
            None
        }
    }
}

impl fmt::Display for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} blocks of size {}:",
            self.disk.block_count(),
            self.disk.block_size()
        )?;
        writeln!(f, "{}", self.block_map.iter().map(|tag| *tag as u8).format(" "))?;
        for file in &self.files {
            writeln!(
                f,
                "{}\tsize: {}\tblock count: {}",
                file.name(),
                file.size(),
                file.blocks().len()
            )?;
            writeln!(f, "\tmetadata block: {}", file.metadata_block())?;
            writeln!(f, "\tblock list: {}", file.blocks().iter().format(" "))?;
            for (i, handle) in file.open_handles.iter().enumerate() {
                writeln!(
                    f,
                    "\t{}) position: {} (block {}, byte {}), is write: {}",
                    i,
                    handle.pos,
                    block_index(self.disk.block_size(), handle.pos),
                    byte_index(self.disk.block_size(), handle.pos),
                    handle.flags.is_write()
                )?;
            }
        }
        Ok(())
    }
}
