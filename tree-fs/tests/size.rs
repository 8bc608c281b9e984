use std::mem;

use tree_fs::{DirEntry, DiskInode, MAX_LENGTH, SECTOR_SIZE};

#[test]
fn layout() {
    assert_eq!(SECTOR_SIZE, mem::size_of::<DiskInode>());
    assert_eq!(32, mem::size_of::<DirEntry>());
}

#[test]
fn addressable_length() {
    // 12 直接 + 128 一级 + 128 * 128 二级
    assert_eq!((12 + 128 + 128 * 128) * 512, MAX_LENGTH);
}

#[test]
fn total_sectors() {
    assert_eq!(0, DiskInode::count_total_sectors(0));
    assert_eq!(1, DiskInode::count_total_sectors(1));
    assert_eq!(12, DiskInode::count_total_sectors(12 * 512));
    // 越过直接索引，多出一个一级索引块
    assert_eq!(14, DiskInode::count_total_sectors(13 * 512));
    assert_eq!(12 + 128 + 1, DiskInode::count_total_sectors((12 + 128) * 512));
    // 越过一级索引，多出二级索引根和一个下属索引块
    assert_eq!(
        12 + 128 + 1 + 1 + 1 + 1,
        DiskInode::count_total_sectors((12 + 128 + 1) * 512)
    );
}
