//! Per-file metadata records, stored in file-entry blocks.
//!
//! Record layout (little-endian):
//! [ size: u32 | name length: u32 | name bytes | block ids:
//!   MAX_FILE_BLOCK_COUNT u32 slots ], zero-padded to the end of the
//! block. Block 0 is the metadata block and never holds file data, so a
//! zero id marks an unused slot in the id buffer.

use std::mem;

use arrayvec::{ArrayString, ArrayVec};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::error::{Error, Result};
use crate::file::File;
use crate::param::{MAX_FILENAME_LENGTH, MAX_FILE_BLOCK_COUNT};

type U32le = U32<LittleEndian>;

#[repr(C)]
#[derive(AsBytes, FromBytes, Unaligned)]
struct DentryHeader {
    size: U32le,
    name_len: U32le,
}

const HEADER_SIZE: usize = mem::size_of::<DentryHeader>();
const IDS_SIZE: usize = 4 * MAX_FILE_BLOCK_COUNT;

/// On-disk length of a record carrying a `name_len`-byte name.
pub(crate) const fn record_len(name_len: usize) -> usize {
    HEADER_SIZE + name_len + IDS_SIZE
}

/// A file's record, decoupled from its in-memory handle state.
#[derive(Debug)]
pub(crate) struct Dentry {
    pub size: u32,
    pub name: ArrayString<MAX_FILENAME_LENGTH>,
    pub blocks: ArrayVec<u32, MAX_FILE_BLOCK_COUNT>,
}

impl Dentry {
    pub fn from_file(file: &File) -> Dentry {
        Dentry {
            size: file.size(),
            name: ArrayString::from(file.name()).expect("name fits by construction"),
            blocks: file.blocks().iter().copied().collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = DentryHeader {
            size: U32le::new(self.size),
            name_len: U32le::new(self.name.len() as u32),
        };
        let mut ids = [U32le::new(0); MAX_FILE_BLOCK_COUNT];
        for (slot, block) in ids.iter_mut().zip(&self.blocks) {
            *slot = U32le::new(*block);
        }

        let mut record = Vec::with_capacity(record_len(self.name.len()));
        record.extend_from_slice(header.as_bytes());
        record.extend_from_slice(self.name.as_bytes());
        record.extend_from_slice(ids.as_bytes());
        record
    }

    /// Decode a record from the contents of its file-entry block.
    pub fn decode(block: &[u8]) -> Result<Dentry> {
        let (header, rest) = LayoutVerified::<_, DentryHeader>::new_unaligned_from_prefix(block)
            .ok_or(Error::Corrupted("file record truncated"))?;
        let name_len = header.name_len.get() as usize;
        if name_len >= MAX_FILENAME_LENGTH {
            return Err(Error::Corrupted("file name length out of range"));
        }
        if rest.len() < name_len + IDS_SIZE {
            return Err(Error::Corrupted("file record does not fit its block"));
        }

        let name = std::str::from_utf8(&rest[..name_len])
            .map_err(|_| Error::Corrupted("file name is not ASCII"))?;
        if !name.is_ascii() {
            return Err(Error::Corrupted("file name is not ASCII"));
        }

        let (ids, _) = LayoutVerified::<_, [U32le; MAX_FILE_BLOCK_COUNT]>::new_unaligned_from_prefix(
            &rest[name_len..],
        )
        .ok_or(Error::Corrupted("file record truncated"))?;
        let mut blocks = ArrayVec::new();
        for id in ids.iter() {
            match id.get() {
                0 => break,
                block => blocks.push(block),
            }
        }

        Ok(Dentry {
            size: header.size.get(),
            name: ArrayString::from(name).expect("length checked above"),
            blocks,
        })
    }
}
