//! 宿主机侧的块设备驱动，供镜像工具与集成测试使用

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use tree_fs::BlockDevice;
use tree_fs::SECTOR_SIZE;

/// 以宿主机文件为后备的块设备
pub struct BlockFile(pub Mutex<File>);

impl BlockDevice for BlockFile {
    fn read_sector(&self, sector: u32, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))
            .expect("seeking error");
        assert_eq!(file.read(buf).unwrap(), SECTOR_SIZE, "not a complete sector!");
    }

    fn write_sector(&self, sector: u32, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))
            .expect("seeking error");
        assert_eq!(
            file.write(buf).unwrap(),
            SECTOR_SIZE,
            "not a complete sector!"
        );
    }
}

/// 驻留内存的块设备
pub struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    pub fn new(total_sectors: u32) -> Self {
        Self(Mutex::new(vec![0; total_sectors as usize * SECTOR_SIZE]))
    }
}

impl BlockDevice for MemDisk {
    fn read_sector(&self, sector: u32, buf: &mut [u8]) {
        let data = self.0.lock().unwrap();
        let start = sector as usize * SECTOR_SIZE;
        buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
    }

    fn write_sector(&self, sector: u32, buf: &[u8]) {
        let mut data = self.0.lock().unwrap();
        let start = sector as usize * SECTOR_SIZE;
        data[start..start + SECTOR_SIZE].copy_from_slice(&buf[..SECTOR_SIZE]);
    }
}
