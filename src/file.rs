//! Files, open handles, and the read/write path.
//!
//! A file is a directory entry plus the ordered list of data blocks that
//! hold its payload. Opening a file yields a cursor over it; many read
//! cursors may coexist, but at most one write cursor per file at any
//! moment. Reads observe a live-updated size but make no ordering
//! guarantees relative to the writer.

use arrayvec::{ArrayString, ArrayVec};
use log::debug;

use crate::error::{Error, Result};
use crate::fcntl::OpenFlags;
use crate::fs::{alloc_block, BlockTag, FileSystem};
use crate::param::{MAX_FILENAME_LENGTH, MAX_FILE_BLOCK_COUNT};

/// A file known to the filesystem.
#[derive(Debug)]
pub struct File {
    pub(crate) name: ArrayString<MAX_FILENAME_LENGTH>,
    pub(crate) size: u32,
    pub(crate) metadata_block: u32,
    pub(crate) blocks: ArrayVec<u32, MAX_FILE_BLOCK_COUNT>,
    pub(crate) open_handles: Vec<OpenFile>,
}

impl File {
    pub(crate) fn new(name: ArrayString<MAX_FILENAME_LENGTH>, metadata_block: u32) -> File {
        File {
            name,
            size: 0,
            metadata_block,
            blocks: ArrayVec::new(),
            open_handles: Vec::new(),
        }
    }

    /// Rebuild a file from its on-disk record. No handles are open.
    pub(crate) fn from_parts(
        name: ArrayString<MAX_FILENAME_LENGTH>,
        size: u32,
        metadata_block: u32,
        blocks: ArrayVec<u32, MAX_FILE_BLOCK_COUNT>,
    ) -> File {
        File {
            name,
            size,
            metadata_block,
            blocks,
            open_handles: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Block holding this file's on-disk record.
    pub fn metadata_block(&self) -> u32 {
        self.metadata_block
    }

    /// Ordered data blocks; entry `k` holds bytes
    /// `[k * block_size, (k + 1) * block_size)` of the file.
    pub fn blocks(&self) -> &[u32] {
        &self.blocks
    }

    /// Number of cursors currently open on this file.
    pub fn open_handle_count(&self) -> usize {
        self.open_handles.len()
    }
}

/// One open cursor over a file. Owned by the file it reads or writes.
#[derive(Debug)]
pub(crate) struct OpenFile {
    pub(crate) id: u64,
    pub(crate) pos: u32,
    pub(crate) flags: OpenFlags,
}

/// Client token for an open cursor: the owning file's metadata block
/// plus a serial that is never reused. A lookup key, never an owner; the
/// filesystem owns the files and each file owns its cursors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Handle {
    meta: u32,
    id: u64,
}

/// Seek origin for [`FileSystem::seek`].
#[derive(Clone, Copy, Debug)]
pub enum SeekFrom {
    /// Absolute position from the start of the file.
    Start(u32),
    /// Signed displacement from the current position.
    Current(i64),
}

/// Block within a file that holds position `pos`.
pub(crate) fn block_index(block_size: u32, pos: u32) -> u32 {
    pos / block_size
}

/// Offset of position `pos` inside its block.
pub(crate) fn byte_index(block_size: u32, pos: u32) -> u32 {
    pos % block_size
}

/// Move a cursor. The target must stay within `[0, size]`; a failed seek
/// leaves the cursor where it was. Seeking exactly to `size` is legal and
/// parks the cursor at end of file.
fn seek_cursor(size: u32, cursor: &mut OpenFile, pos: SeekFrom) -> Result<()> {
    let target = match pos {
        SeekFrom::Start(offset) => i64::from(offset),
        SeekFrom::Current(delta) => i64::from(cursor.pos) + delta,
    };
    if target < 0 || target > i64::from(size) {
        return Err(Error::OutOfRange);
    }
    cursor.pos = target as u32;
    Ok(())
}

impl FileSystem {
    /// Open `name`. A write open of an absent name creates the file; a
    /// read open of an absent name fails. At most one write handle may be
    /// open per file; read handles coexist freely with it.
    pub fn open(&mut self, name: &str, flags: OpenFlags) -> Result<Handle> {
        if self.find_file(name).is_none() {
            if !flags.is_write() {
                return Err(Error::NotFound);
            }
            self.create_file(name)?;
        }

        let id = self.next_handle;
        let file = match self.files.iter_mut().find(|file| file.name() == name) {
            Some(file) => file,
            None => return Err(Error::NotFound),
        };
        if flags.is_write() && file.open_handles.iter().any(|h| h.flags.is_write()) {
            return Err(Error::WriteConflict);
        }

        self.next_handle += 1;
        file.open_handles.push(OpenFile { id, pos: 0, flags });
        debug!("open {:?} (write: {}), handle {}", name, flags.is_write(), id);
        Ok(Handle {
            meta: file.metadata_block,
            id,
        })
    }

    /// Close `handle`. Fails when it is not currently open.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        let file = self.file_by_meta_mut(handle.meta).ok_or(Error::BadHandle)?;
        let at = file
            .open_handles
            .iter()
            .position(|h| h.id == handle.id)
            .ok_or(Error::BadHandle)?;
        let _ = file.open_handles.remove(at);
        debug!("close handle {} of {:?}", handle.id, file.name());
        Ok(())
    }

    /// Move the cursor of `handle` within `[0, size]`.
    pub fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<()> {
        let file = self.file_by_meta_mut(handle.meta).ok_or(Error::BadHandle)?;
        let size = file.size;
        let cursor = file
            .open_handles
            .iter_mut()
            .find(|h| h.id == handle.id)
            .ok_or(Error::BadHandle)?;
        seek_cursor(size, cursor, pos)
    }

    /// Write `buf` at the cursor of `handle`.
    ///
    /// The writer only extends: every block-aligned step claims a fresh
    /// data block, appends it to the file's block list, and grows the
    /// size, so block-aligned payload is never overwritten in place.
    /// Mid-block steps fill the cursor's block up to its end.
    ///
    /// Returns the number of bytes accepted, which falls short of
    /// `buf.len()` exactly when the disk or the file's block list runs
    /// out of room.
    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let Self {
            disk,
            block_map,
            files,
            ..
        } = self;
        let file = files
            .iter_mut()
            .find(|file| file.metadata_block == handle.meta)
            .ok_or(Error::BadHandle)?;
        let at = file
            .open_handles
            .iter()
            .position(|h| h.id == handle.id)
            .ok_or(Error::BadHandle)?;
        if !file.open_handles[at].flags.is_write() {
            return Err(Error::InvalidArgument);
        }

        let block_size = disk.block_size();
        let mut written = 0;
        while written < buf.len() {
            let pos = file.open_handles[at].pos;
            let offset = byte_index(block_size, pos);
            let (block, len) = if offset == 0 {
                // Start of a not-yet-existing block: claim a fresh one.
                if file.blocks.is_full() {
                    break;
                }
                let block = match alloc_block(block_map, BlockTag::FileData) {
                    Some(block) => block,
                    None => break,
                };
                file.blocks.push(block);
                let len = (buf.len() - written).min(block_size as usize);
                (block, len)
            } else {
                let block = match file.blocks.get(block_index(block_size, pos) as usize) {
                    Some(block) => *block,
                    None => break,
                };
                let len = (buf.len() - written).min((block_size - offset) as usize);
                (block, len)
            };

            match disk.write_in_block(block, offset, &buf[written..written + len]) {
                Ok(()) => {}
                Err(err) if written == 0 => return Err(err),
                Err(_) => break,
            }
            file.size += len as u32;
            written += len;
            let size = file.size;
            seek_cursor(size, &mut file.open_handles[at], SeekFrom::Current(len as i64))?;
        }
        Ok(written)
    }

    /// Read into `buf` from the cursor of `handle`.
    ///
    /// Returns the number of bytes transferred; the count falls short of
    /// `buf.len()` when the cursor reaches end of file. Reads never
    /// allocate blocks and never grow the file.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let Self { disk, files, .. } = self;
        let file = files
            .iter_mut()
            .find(|file| file.metadata_block == handle.meta)
            .ok_or(Error::BadHandle)?;
        let at = file
            .open_handles
            .iter()
            .position(|h| h.id == handle.id)
            .ok_or(Error::BadHandle)?;
        if file.size == 0 {
            return Ok(0);
        }

        let block_size = disk.block_size();
        let mut read = 0;
        while read < buf.len() && file.open_handles[at].pos < file.size {
            let pos = file.open_handles[at].pos;
            let offset = byte_index(block_size, pos);
            let block = match file.blocks.get(block_index(block_size, pos) as usize) {
                Some(block) => *block,
                None => break,
            };
            let len = (buf.len() - read)
                .min((block_size - offset) as usize)
                .min((file.size - pos) as usize);

            match disk.read_in_block(block, offset, &mut buf[read..read + len]) {
                Ok(()) => {}
                Err(err) if read == 0 => return Err(err),
                Err(_) => break,
            }
            read += len;
            let size = file.size;
            seek_cursor(size, &mut file.open_handles[at], SeekFrom::Current(len as i64))?;
        }
        Ok(read)
    }
}
