//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此在内存中开辟一组定长缓冲区，
//! 所有对块设备的操作都经过它。缓存采取写回策略，只有两处例外会直写：
//! 未命中时的非整扇区写（保证读改写后的扇区立即落盘），
//! 以及 [`BlockCache::flush`]。
//!
//! 调度策略：未命中时驱逐 `last_touched` 最小的缓冲区（最久未触碰），
//! 脏块先写回。整组缓冲区由一把粗粒度锁保护，并在锁内完成设备 I/O；
//! 缓存很小、设备才是瓶颈，正确性比细粒度锁更重要。

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::BlockDevice;
use crate::SectorBuf;
use crate::SECTOR_SIZE;

/// 块缓存个数的上限
const CACHE_SECTORS: usize = 64;

/// 块缓存全局管理，缓存、调度缓存块
pub struct BlockCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    /// 按 `last_touched` 升序排列，队首即驱逐候选
    slots: Vec<CacheSlot>,
    /// 单调递增的触碰计时
    tick: u64,
}

/// 内存中的缓存块
struct CacheSlot {
    free: bool,
    dirty: bool,
    /// `!free` 时与 `sector` 一同标识缓冲区内容
    device: Option<Arc<dyn BlockDevice>>,
    sector: u32,
    last_touched: u64,
    data: SectorBuf,
}

impl BlockCache {
    pub fn new() -> Self {
        let slots = (0..CACHE_SECTORS)
            .map(|i| CacheSlot {
                free: true,
                dirty: false,
                device: None,
                sector: 0,
                last_touched: i as u64,
                data: [0; SECTOR_SIZE],
            })
            .collect();

        Self {
            inner: Mutex::new(CacheInner {
                slots,
                tick: CACHE_SECTORS as u64,
            }),
        }
    }

    /// 读出整个扇区
    #[inline]
    pub fn read(&self, device: &Arc<dyn BlockDevice>, sector: u32, buf: &mut [u8]) {
        self.read_offset(device, sector, buf, 0, SECTOR_SIZE);
    }

    /// 读出扇区内 `[sector_ofs, sector_ofs + chunk)` 的数据
    pub fn read_offset(
        &self,
        device: &Arc<dyn BlockDevice>,
        sector: u32,
        buf: &mut [u8],
        sector_ofs: usize,
        chunk: usize,
    ) {
        assert!(sector_ofs + chunk <= SECTOR_SIZE);

        let mut inner = self.inner.lock();

        if let Some(index) = inner.find(device, sector) {
            buf[..chunk].copy_from_slice(&inner.slots[index].data[sector_ofs..sector_ofs + chunk]);
            inner.touch(index);
            return;
        }

        let index = inner.evict();
        let slot = &mut inner.slots[index];
        slot.device = Some(device.clone());
        slot.sector = sector;
        slot.free = false;
        device.read_sector(sector, &mut slot.data);
        buf[..chunk].copy_from_slice(&slot.data[sector_ofs..sector_ofs + chunk]);
        inner.touch(index);
    }

    /// 写入整个扇区
    #[inline]
    pub fn write(&self, device: &Arc<dyn BlockDevice>, sector: u32, buf: &[u8]) {
        self.write_offset(device, sector, buf, 0, SECTOR_SIZE);
    }

    /// 写入扇区内 `[sector_ofs, sector_ofs + chunk)` 的数据
    pub fn write_offset(
        &self,
        device: &Arc<dyn BlockDevice>,
        sector: u32,
        buf: &[u8],
        sector_ofs: usize,
        chunk: usize,
    ) {
        assert!(sector_ofs + chunk <= SECTOR_SIZE);

        let mut inner = self.inner.lock();

        if let Some(index) = inner.find(device, sector) {
            let slot = &mut inner.slots[index];
            slot.data[sector_ofs..sector_ofs + chunk].copy_from_slice(&buf[..chunk]);
            slot.dirty = true;
            inner.touch(index);
            return;
        }

        let index = inner.evict();
        let slot = &mut inner.slots[index];
        slot.device = Some(device.clone());
        slot.sector = sector;
        slot.free = false;

        if chunk == SECTOR_SIZE {
            // 整扇区覆盖，无需读入旧内容
            slot.data.copy_from_slice(&buf[..SECTOR_SIZE]);
            slot.dirty = true;
        } else {
            // 读改写：保住块内未触及的字节，并立即落盘
            device.read_sector(sector, &mut slot.data);
            slot.data[sector_ofs..sector_ofs + chunk].copy_from_slice(&buf[..chunk]);
            device.write_sector(sector, &slot.data);
            slot.dirty = false;
        }

        inner.touch(index);
    }

    /// 把所有脏块写回设备。不会使缓存失效。
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut().filter(|slot| !slot.free && slot.dirty) {
            let device = slot.device.as_ref().unwrap();
            device.write_sector(slot.sector, &slot.data);
            slot.dirty = false;
        }
    }

    /// 写回并废弃全部缓冲区
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut() {
            if !slot.free && slot.dirty {
                let device = slot.device.as_ref().unwrap();
                device.write_sector(slot.sector, &slot.data);
            }
            slot.free = true;
            slot.dirty = false;
            slot.device = None;
        }
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInner {
    /// 尝试命中缓冲区
    fn find(&self, device: &Arc<dyn BlockDevice>, sector: u32) -> Option<usize> {
        self.slots.iter().position(|slot| {
            !slot.free
                && slot.sector == sector
                && slot
                    .device
                    .as_ref()
                    .is_some_and(|cached| Arc::ptr_eq(cached, device))
        })
    }

    /// 选出驱逐候选：`last_touched` 最小者，脏则先写回
    fn evict(&mut self) -> usize {
        let index = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| slot.last_touched)
            .map(|(index, _)| index)
            .unwrap();

        let slot = &mut self.slots[index];
        if !slot.free && slot.dirty {
            let device = slot.device.as_ref().unwrap();
            device.write_sector(slot.sector, &slot.data);
        }
        slot.free = true;
        slot.dirty = false;

        index
    }

    /// 更新触碰时间并维持按时间升序
    fn touch(&mut self, index: usize) {
        self.slots[index].last_touched = self.tick;
        self.tick += 1;
        self.slots.sort_by_key(|slot| slot.last_touched);
    }
}
