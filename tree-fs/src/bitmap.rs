//! 空闲扇区位图：[`FreeMap`] 的磁盘实现。
//!
//! 位图占据 [`FREE_MAP_SECTOR`]，逐位指示对应扇区的分配情况，
//! 经块缓存读写。一把锁把"找位-置位-写回"做成原子操作，
//! 且每次申请或退还都只在锁内停留这一小段。

use alloc::sync::Arc;

use spin::Mutex;

use crate::BlockCache;
use crate::BlockDevice;
use crate::FreeMap;
use crate::SectorBuf;
use crate::FREE_MAP_SECTOR;
use crate::SECTOR_BITS;
use crate::SECTOR_SIZE;

pub struct Bitmap {
    device: Arc<dyn BlockDevice>,
    cache: Arc<BlockCache>,
    /// 位图所辖的扇区总数
    total_sectors: u32,
    lock: Mutex<()>,
}

impl Bitmap {
    /// 绑定到设备上既有的位图
    pub fn new(device: Arc<dyn BlockDevice>, cache: Arc<BlockCache>, total_sectors: u32) -> Self {
        assert!(total_sectors as usize <= SECTOR_BITS);
        Self {
            device,
            cache,
            total_sectors,
            lock: Mutex::new(()),
        }
    }

    /// 建立全空的位图并写穿缓存
    pub fn format(
        device: Arc<dyn BlockDevice>,
        cache: Arc<BlockCache>,
        total_sectors: u32,
    ) -> Self {
        let bitmap = Self::new(device, cache, total_sectors);
        bitmap
            .cache
            .write(&bitmap.device, FREE_MAP_SECTOR, &[0; SECTOR_SIZE]);
        bitmap
    }

    fn load(&self) -> SectorBuf {
        let mut buf = [0; SECTOR_SIZE];
        self.cache.read(&self.device, FREE_MAP_SECTOR, &mut buf);
        buf
    }

    fn store(&self, buf: &SectorBuf) {
        self.cache.write(&self.device, FREE_MAP_SECTOR, buf);
    }
}

impl FreeMap for Bitmap {
    fn allocate(&self, n: u32) -> Option<u32> {
        assert_eq!(n, 1);
        let _guard = self.lock.lock();
        let mut buf = self.load();

        // 逐字节找还有0位的bit组
        let (index, byte) = buf
            .iter_mut()
            .enumerate()
            .find(|(_, byte)| **byte != u8::MAX)?;
        let inbyte_index = byte.trailing_ones();

        let sector = index as u32 * 8 + inbyte_index;
        if sector >= self.total_sectors {
            return None;
        }

        *byte |= 1 << inbyte_index;
        self.store(&buf);

        Some(sector)
    }

    fn release(&self, sector: u32, n: u32) {
        assert_eq!(n, 1);
        assert!(sector < self.total_sectors);
        let _guard = self.lock.lock();
        let mut buf = self.load();

        let byte = &mut buf[sector as usize / 8];
        // 退还的扇区一定得在册
        assert_ne!(*byte & (1 << (sector % 8)), 0);
        *byte &= !(1 << (sector % 8));

        self.store(&buf);
    }

    fn in_use(&self) -> usize {
        let _guard = self.lock.lock();
        self.load()
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum()
    }
}
