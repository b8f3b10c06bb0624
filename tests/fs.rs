//! End-to-end scenarios over small disk images.

use minifat::{BlockTag, Error, FileSystem, OpenFlags, SeekFrom};
use tempfile::TempDir;

fn fresh(block_size: u32, block_count: u32) -> (TempDir, FileSystem) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let fs = FileSystem::create(dir.path().join("disk.img"), block_size, block_count).unwrap();
    (dir, fs)
}

/// The quantified invariants that must hold after every operation mix:
/// block 0 tagged metadata, every claimed block tagged and claimed once,
/// no unreferenced non-empty block, sizes within the block list.
fn check_invariants(fs: &FileSystem) {
    let map = fs.block_map();
    assert_eq!(map[0], BlockTag::Metadata);

    let mut claimed = vec![false; map.len()];
    claimed[0] = true;
    for file in fs.files() {
        let meta = file.metadata_block() as usize;
        assert_eq!(map[meta], BlockTag::FileEntry);
        assert!(!claimed[meta], "block {} claimed twice", meta);
        claimed[meta] = true;
        for block in file.blocks() {
            let block = *block as usize;
            assert_eq!(map[block], BlockTag::FileData);
            assert!(!claimed[block], "block {} claimed twice", block);
            claimed[block] = true;
        }
        assert!(
            u64::from(file.size()) <= u64::from(fs.block_size()) * file.blocks().len() as u64
        );
    }
    for (i, tag) in map.iter().enumerate() {
        assert!(
            *tag == BlockTag::Empty || claimed[i],
            "block {} is tagged but unreferenced",
            i
        );
    }
}

#[test]
fn backing_file_has_exact_size() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("disk.img");
    let _fs = FileSystem::create(&path, 64, 16).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 64 * 16);
}

#[test]
fn tiny_file_round_trip() {
    let (_dir, mut fs) = fresh(64, 16);
    let h = fs.open("a.txt", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(h, b"hello").unwrap(), 5);
    fs.close(h).unwrap();

    let h = fs.open("a.txt", OpenFlags::O_RDONLY).unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    fs.close(h).unwrap();

    assert_eq!(fs.file_size("a.txt"), 5);
    check_invariants(&fs);
}

#[test]
fn multi_block_file() {
    let (_dir, mut fs) = fresh(64, 16);
    let data: Vec<u8> = (0..150u32).map(|i| (i % 256) as u8).collect();
    let h = fs.open("big", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(h, &data).unwrap(), 150);
    fs.close(h).unwrap();

    let file = &fs.files()[0];
    assert_eq!(file.blocks().len(), 3);
    assert_eq!(file.size(), 150);
    assert_eq!(file.size() - 2 * 64, 22, "used bytes of the last block");

    let h = fs.open("big", OpenFlags::O_RDONLY).unwrap();
    let mut buf = vec![0u8; 150];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 150);
    assert_eq!(buf, data);
    fs.close(h).unwrap();
    check_invariants(&fs);
}

#[test]
fn fill_disk_and_reject() {
    let (_dir, mut fs) = fresh(64, 16);
    // Each file burns a file-entry block plus one data block.
    let mut i = 0;
    loop {
        let name = format!("f{}", i);
        let h = fs.open(&name, OpenFlags::O_WRONLY).unwrap();
        let n = fs.write(h, &[0xA5]).unwrap();
        fs.close(h).unwrap();
        if n == 0 {
            break;
        }
        i += 1;
    }

    assert_eq!(fs.find_empty_block(), None);
    assert_eq!(
        fs.open("overflow", OpenFlags::O_WRONLY).unwrap_err(),
        Error::Full
    );
    let used = fs
        .block_map()
        .iter()
        .filter(|tag| **tag != BlockTag::Empty)
        .count();
    assert_eq!(used, 16, "no block map entry may be lost");
    check_invariants(&fs);
}

#[test]
fn delete_reclaims_blocks() {
    let (_dir, mut fs) = fresh(64, 16);
    let data = vec![7u8; 150];
    let h = fs.open("big", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(h, &data).unwrap(), 150);
    fs.close(h).unwrap();

    fs.delete("big").unwrap();
    let used = fs
        .block_map()
        .iter()
        .filter(|tag| **tag != BlockTag::Empty)
        .count();
    assert_eq!(used, 1, "only block 0 stays claimed");

    // First-fit hands the lowest reclaimed index back out.
    fs.create_file("new").unwrap();
    assert_eq!(fs.files()[0].metadata_block(), 1);
    check_invariants(&fs);
}

#[test]
fn single_writer_per_file() {
    let (_dir, mut fs) = fresh(64, 16);
    let w = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(
        fs.open("x", OpenFlags::O_WRONLY).unwrap_err(),
        Error::WriteConflict
    );

    // Readers coexist with the writer.
    let r1 = fs.open("x", OpenFlags::O_RDONLY).unwrap();
    let r2 = fs.open("x", OpenFlags::O_RDONLY).unwrap();

    fs.close(w).unwrap();
    let w2 = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    fs.close(w2).unwrap();
    fs.close(r1).unwrap();
    fs.close(r2).unwrap();
}

#[test]
fn reader_observes_live_size() {
    let (_dir, mut fs) = fresh(64, 16);
    let w = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    let r = fs.open("x", OpenFlags::O_RDONLY).unwrap();

    assert_eq!(fs.write(w, b"abc").unwrap(), 3);
    let mut buf = [0u8; 8];
    assert_eq!(fs.read(r, &mut buf).unwrap(), 3);

    assert_eq!(fs.write(w, b"def").unwrap(), 3);
    assert_eq!(fs.read(r, &mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"def");

    fs.close(w).unwrap();
    fs.close(r).unwrap();
}

#[test]
fn read_open_of_missing_file_fails() {
    let (_dir, mut fs) = fresh(64, 16);
    assert_eq!(
        fs.open("nope", OpenFlags::O_RDONLY).unwrap_err(),
        Error::NotFound
    );
}

#[test]
fn write_open_creates_missing_file() {
    let (_dir, mut fs) = fresh(64, 16);
    let h = fs.open("fresh", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.file_size("fresh"), 0);
    assert_eq!(fs.files().len(), 1);
    fs.close(h).unwrap();
    check_invariants(&fs);
}

#[test]
fn delete_refuses_open_or_missing_files() {
    let (_dir, mut fs) = fresh(64, 16);
    assert_eq!(fs.delete("nope").unwrap_err(), Error::NotFound);

    let h = fs.open("held", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(h, b"xy").unwrap(), 2);
    assert_eq!(fs.files()[0].open_handle_count(), 1);
    assert_eq!(fs.delete("held").unwrap_err(), Error::Busy);
    assert_eq!(fs.file_size("held"), 2, "failed delete changes nothing");

    fs.close(h).unwrap();
    fs.delete("held").unwrap();
    check_invariants(&fs);
}

#[test]
fn seek_bounds() {
    let (_dir, mut fs) = fresh(64, 16);
    let w = fs.open("s", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(w, b"01234").unwrap(), 5);
    fs.close(w).unwrap();

    let h = fs.open("s", OpenFlags::O_RDONLY).unwrap();
    // To the end is legal, one past is not.
    fs.seek(h, SeekFrom::Start(5)).unwrap();
    assert_eq!(
        fs.seek(h, SeekFrom::Start(6)).unwrap_err(),
        Error::OutOfRange
    );
    // Idempotent: repeating an absolute seek keeps the position.
    fs.seek(h, SeekFrom::Start(3)).unwrap();
    fs.seek(h, SeekFrom::Start(3)).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"34");

    // Below zero is unreachable from the start of the file.
    fs.seek(h, SeekFrom::Start(0)).unwrap();
    assert_eq!(
        fs.seek(h, SeekFrom::Current(-1)).unwrap_err(),
        Error::OutOfRange
    );
    fs.close(h).unwrap();
}

#[test]
fn read_past_eof_is_partial() {
    let (_dir, mut fs) = fresh(64, 16);
    let w = fs.open("short", OpenFlags::O_WRONLY).unwrap();
    assert_eq!(fs.write(w, b"hello").unwrap(), 5);
    fs.close(w).unwrap();

    let h = fs.open("short", OpenFlags::O_RDONLY).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
    assert_eq!(fs.read(h, &mut buf).unwrap(), 0, "cursor parked at the end");
    fs.close(h).unwrap();
}

#[test]
fn partial_write_when_disk_fills() {
    let (_dir, mut fs) = fresh(64, 8);
    // One entry block leaves six data blocks: 384 bytes of room.
    let h = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    let data = vec![1u8; 7 * 64];
    assert_eq!(fs.write(h, &data).unwrap(), 6 * 64);
    assert_eq!(fs.file_size("x"), 6 * 64, "size reflects accepted bytes only");
    assert_eq!(fs.write(h, b"more").unwrap(), 0);
    fs.close(h).unwrap();
    check_invariants(&fs);
}

#[test]
fn block_list_capacity_caps_file() {
    let (_dir, mut fs) = fresh(64, 32);
    let h = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    let data = vec![2u8; 13 * 64];
    assert_eq!(
        fs.write(h, &data).unwrap(),
        minifat::MAX_FILE_BLOCK_COUNT * 64
    );
    fs.close(h).unwrap();
    check_invariants(&fs);
}

#[test]
fn duplicate_names_are_rejected() {
    let (_dir, mut fs) = fresh(64, 16);
    fs.create_file("twice").unwrap();
    assert_eq!(fs.create_file("twice").unwrap_err(), Error::DuplicateName);
}

#[test]
fn name_limits() {
    let (_dir, mut fs) = fresh(64, 16);
    // The record for a long name would not fit a 64-byte block.
    assert_eq!(
        fs.create_file("name-beyond-the-block").unwrap_err(),
        Error::NameTooLong
    );

    let (_dir, mut fs) = fresh(128, 16);
    let long = "x".repeat(32);
    assert_eq!(fs.create_file(&long).unwrap_err(), Error::NameTooLong);
    fs.create_file(&long[..31]).unwrap();
}

#[test]
fn stale_handles_are_rejected() {
    let (_dir, mut fs) = fresh(64, 16);
    let h = fs.open("x", OpenFlags::O_WRONLY).unwrap();
    fs.close(h).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(fs.close(h).unwrap_err(), Error::BadHandle);
    assert_eq!(fs.read(h, &mut buf).unwrap_err(), Error::BadHandle);
    assert_eq!(fs.write(h, b"x").unwrap_err(), Error::BadHandle);
    assert_eq!(
        fs.seek(h, SeekFrom::Start(0)).unwrap_err(),
        Error::BadHandle
    );
}

#[test]
fn read_mode_handle_cannot_write() {
    let (_dir, mut fs) = fresh(64, 16);
    fs.create_file("ro").unwrap();
    let h = fs.open("ro", OpenFlags::O_RDONLY).unwrap();
    assert_eq!(fs.write(h, b"x").unwrap_err(), Error::InvalidArgument);
    fs.close(h).unwrap();
}

#[test]
fn geometry_must_fit_block_zero() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("disk.img");
    assert_eq!(
        FileSystem::create(&path, 0, 16).unwrap_err(),
        Error::InvalidArgument
    );
    assert_eq!(
        FileSystem::create(&path, 64, 0).unwrap_err(),
        Error::InvalidArgument
    );
    // 8 header bytes + 64 tag bytes do not fit a 64-byte block.
    assert_eq!(
        FileSystem::create(&path, 64, 64).unwrap_err(),
        Error::InvalidArgument
    );
}
