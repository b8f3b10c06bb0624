/// Maximum file name length. Names must be strictly shorter than this.
pub const MAX_FILENAME_LENGTH: usize = 32;

/// Data blocks per file: the on-disk capacity of a file's block list.
pub const MAX_FILE_BLOCK_COUNT: usize = 12;
