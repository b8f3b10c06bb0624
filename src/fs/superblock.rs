//! Block 0: filesystem-wide metadata.
//!
//! Disk layout of block 0 (little-endian):
//! [ block count: u32 | block size: u32 | block map: one tag byte per
//!   block ], zero-padded to the end of the block. Callers must choose
//! `block_size >= 8 + block_count` so the record fits.

use std::convert::TryFrom;
use std::mem;

use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::error::{Error, Result};

type U32le = U32<LittleEndian>;

/// Classification of one block in the block map.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum BlockTag {
    /// Unallocated.
    Empty = 0,
    /// Block 0, the filesystem metadata block.
    Metadata = 1,
    /// A file's metadata record.
    FileEntry = 2,
    /// A file's payload bytes.
    FileData = 3,
}

impl TryFrom<u8> for BlockTag {
    type Error = Error;

    fn try_from(b: u8) -> Result<BlockTag> {
        match b {
            0 => Ok(BlockTag::Empty),
            1 => Ok(BlockTag::Metadata),
            2 => Ok(BlockTag::FileEntry),
            3 => Ok(BlockTag::FileData),
            _ => Err(Error::Corrupted("unknown block tag")),
        }
    }
}

/// On-disk header of block 0. The block map follows immediately.
#[repr(C)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy)]
pub(crate) struct Superblock {
    block_count: U32le,
    block_size: U32le,
}

/// Bytes of block 0 taken by the header, ahead of the block map.
pub(crate) const SB_SIZE: usize = mem::size_of::<Superblock>();

const_assert_eq!(SB_SIZE, 8);

impl Superblock {
    pub fn new(block_count: u32, block_size: u32) -> Superblock {
        Superblock {
            block_count: U32le::new(block_count),
            block_size: U32le::new(block_size),
        }
    }

    /// Read the header back from the start of a block-0 image.
    pub fn decode(bytes: &[u8]) -> Result<Superblock> {
        match LayoutVerified::<_, Superblock>::new_unaligned_from_prefix(bytes) {
            Some((sb, _)) => Ok(*sb),
            None => Err(Error::Corrupted("metadata block truncated")),
        }
    }

    pub fn block_count(&self) -> u32 {
        self.block_count.get()
    }

    pub fn block_size(&self) -> u32 {
        self.block_size.get()
    }

    /// Serialize the header followed by the block map.
    pub fn encode(&self, map: &[BlockTag]) -> Vec<u8> {
        let mut block = Vec::with_capacity(SB_SIZE + map.len());
        block.extend_from_slice(self.as_bytes());
        block.extend(map.iter().map(|tag| *tag as u8));
        block
    }
}

/// Decode the block map that follows the header.
pub(crate) fn decode_map(bytes: &[u8]) -> Result<Vec<BlockTag>> {
    bytes.iter().map(|b| BlockTag::try_from(*b)).collect()
}
