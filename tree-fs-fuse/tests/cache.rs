//! 块缓存的策略测试：一致性、驱逐顺序、写回时机

use std::sync::{Arc, Mutex};

use tree_fs::{BlockCache, BlockDevice, SECTOR_SIZE};
use tree_fs_fuse::MemDisk;

/// 记录设备实际收到的读写序列
struct TraceDisk {
    data: Mutex<Vec<u8>>,
    reads: Mutex<Vec<u32>>,
    writes: Mutex<Vec<u32>>,
}

impl TraceDisk {
    fn new(total_sectors: u32) -> Self {
        Self {
            data: Mutex::new(vec![0; total_sectors as usize * SECTOR_SIZE]),
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    fn reads(&self) -> Vec<u32> {
        self.reads.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<u32> {
        self.writes.lock().unwrap().clone()
    }
}

impl BlockDevice for TraceDisk {
    fn read_sector(&self, sector: u32, buf: &mut [u8]) {
        self.reads.lock().unwrap().push(sector);
        let data = self.data.lock().unwrap();
        let start = sector as usize * SECTOR_SIZE;
        buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
    }

    fn write_sector(&self, sector: u32, buf: &[u8]) {
        self.writes.lock().unwrap().push(sector);
        let mut data = self.data.lock().unwrap();
        let start = sector as usize * SECTOR_SIZE;
        data[start..start + SECTOR_SIZE].copy_from_slice(&buf[..SECTOR_SIZE]);
    }
}

#[test]
fn coherence_under_eviction() {
    let cache = BlockCache::new();
    let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(512));

    let written = [0xa5u8; SECTOR_SIZE];
    cache.write(&device, 7, &written);

    // 途经大量无关扇区，迫使 7 号被驱逐再读回
    let mut scratch = [0u8; SECTOR_SIZE];
    for sector in 100..300 {
        cache.read(&device, sector, &mut scratch);
    }

    let mut read_back = [0u8; SECTOR_SIZE];
    cache.read(&device, 7, &mut read_back);
    assert_eq!(written, read_back);
}

#[test]
fn evicts_least_recently_touched() {
    let trace = Arc::new(TraceDisk::new(512));
    let device: Arc<dyn BlockDevice> = trace.clone();
    let cache = BlockCache::new();

    // 脏写 1 号，再以 2..=64 号填满全部 64 个槽位
    cache.write(&device, 1, &[1; SECTOR_SIZE]);
    let mut scratch = [0u8; SECTOR_SIZE];
    for sector in 2..=64 {
        cache.read(&device, sector, &mut scratch);
    }
    assert!(trace.writes().is_empty());

    // 第 65 个扇区挤掉最久未触碰的 1 号，其脏数据此刻写回
    cache.read(&device, 65, &mut scratch);
    assert_eq!(vec![1], trace.writes());
}

#[test]
fn write_back_on_flush() {
    let trace = Arc::new(TraceDisk::new(64));
    let device: Arc<dyn BlockDevice> = trace.clone();
    let cache = BlockCache::new();

    cache.write(&device, 3, &[3; SECTOR_SIZE]);
    cache.write(&device, 4, &[4; SECTOR_SIZE]);
    assert!(trace.writes().is_empty());

    cache.flush();
    let mut flushed = trace.writes();
    flushed.sort();
    assert_eq!(vec![3, 4], flushed);

    // flush 不会使缓存失效，也不会重复写未再弄脏的块
    cache.flush();
    assert_eq!(2, trace.writes().len());
}

#[test]
fn partial_write_miss_is_durable() {
    let trace = Arc::new(TraceDisk::new(64));
    let device: Arc<dyn BlockDevice> = trace.clone();
    let cache = BlockCache::new();

    // 未命中时的非整扇区写：读入旧内容后立即落盘
    cache.write_offset(&device, 9, &[0xee; 16], 32, 16);
    assert_eq!(vec![9], trace.reads());
    assert_eq!(vec![9], trace.writes());

    // 已经干净，flush 不再写它
    cache.flush();
    assert_eq!(1, trace.writes().len());

    let mut read_back = [0u8; 16];
    cache.read_offset(&device, 9, &mut read_back, 32, 16);
    assert_eq!([0xee; 16], read_back);
}

#[test]
fn full_sector_write_miss_skips_read() {
    let trace = Arc::new(TraceDisk::new(64));
    let device: Arc<dyn BlockDevice> = trace.clone();
    let cache = BlockCache::new();

    cache.write(&device, 5, &[0x55; SECTOR_SIZE]);
    assert!(trace.reads().is_empty());
    // 整扇区覆盖是纯写回
    assert!(trace.writes().is_empty());
}

#[test]
fn offset_reads_see_offset_writes() {
    let cache = BlockCache::new();
    let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(64));

    cache.write(&device, 2, &[0x11; SECTOR_SIZE]);
    cache.write_offset(&device, 2, &[0x22; 8], 100, 8);

    let mut read_back = [0u8; 12];
    cache.read_offset(&device, 2, &mut read_back, 96, 12);
    assert_eq!(&[0x11; 4][..], &read_back[..4]);
    assert_eq!(&[0x22; 8][..], &read_back[4..]);
}
