use bitflags::bitflags;

bitflags! {
    /// Open-mode flags for [`crate::FileSystem::open`].
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0;
        const O_WRONLY = 0x1;
    }
}

impl OpenFlags {
    /// Whether this mode may extend the file.
    pub fn is_write(self) -> bool {
        self.contains(OpenFlags::O_WRONLY)
    }
}
