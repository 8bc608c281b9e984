//! 多级索引的磁盘 inode
//! - 直接索引：inode 内置 12 个扇区编号
//! - 一级索引：整个索引块连续存储128个编号，每个都指向一个数据扇区
//! - 二级索引：整个索引块连续存储128个编号，每个都指向一个一级索引块
//!
//! 编号为 0 表示槽位未分配。
//!
//! ## 扩缩容
//!
//! [`DiskInode::resize`] 分两阶段：先按分配不变式算出需要的新扇区数并
//! 一次性向空闲图申请（中途失败则整批退还，inode 原样不动），
//! 再提交指针编辑并最后落定 `length`。扩与缩共用同一趟遍历，
//! 判据统一为：槽位 `i` 启用当且仅当 `length > i * 512`。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::{mem, ptr, slice};

use vfs::{Error, InodeKind};

use crate::BlockCache;
use crate::BlockDevice;
use crate::FreeMap;
use crate::SectorBuf;
use crate::SECTOR_SIZE;

/// inode 的合法性标记
const INODE_MAGIC: u32 = 0x6e6f_6465;

/// 间接索引块的编号容量
const INDIRECT_COUNT: usize = SECTOR_SIZE / 4;
/// 间接索引块
type IndexBlock = [u32; INDIRECT_COUNT];

/// 直接索引槽位数量
const DIRECT_COUNT: usize = 12;
/// 直接索引时的扇区容量
const DIRECT_CAP: usize = DIRECT_COUNT;
/// 用上一级索引时的扇区容量
const INDIRECT1_CAP: usize = DIRECT_CAP + INDIRECT_COUNT;
/// 用上二级索引时的扇区容量
const INDIRECT2_CAP: usize = INDIRECT1_CAP + INDIRECT_COUNT * INDIRECT_COUNT;

/// 文件的最大字节数，约 8 MiB
pub const MAX_LENGTH: usize = INDIRECT2_CAP * SECTOR_SIZE;

const RESERVED_WORDS: usize = SECTOR_SIZE / 4 - (3 + DIRECT_COUNT + 2);

/// 磁盘上的 inode，恰好占据一个扇区
#[repr(C)]
pub struct DiskInode {
    /// 文件字节数，恒为非负
    length: i32,
    magic: u32,
    kind: u32,
    /// 直接索引
    direct: [u32; DIRECT_COUNT],
    /// 指向一个一级索引块
    indirect: u32,
    /// 指向一个二级索引块
    doubly_indirect: u32,
    _reserved: [u32; RESERVED_WORDS],
}

impl DiskInode {
    pub fn new(kind: InodeKind) -> Self {
        Self {
            length: 0,
            magic: INODE_MAGIC,
            kind: kind as u32,
            direct: [0; DIRECT_COUNT],
            indirect: 0,
            doubly_indirect: 0,
            _reserved: [0; RESERVED_WORDS],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[inline]
    pub fn len(&self) -> usize {
        assert!(self.length >= 0);
        self.length as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn kind(&self) -> InodeKind {
        match self.kind {
            1 => InodeKind::File,
            2 => InodeKind::Directory,
            _ => panic!("corrupted inode kind: {}", self.kind),
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == InodeKind::Directory
    }

    /// 返回字节偏移 `pos` 落在哪个扇区；`pos` 超出文件长度时返回空，
    /// 读取方以此短路到 EOF。
    pub fn sector_of(
        &self,
        pos: usize,
        device: &Arc<dyn BlockDevice>,
        cache: &BlockCache,
    ) -> Option<u32> {
        if pos >= self.len() {
            return None;
        }

        let index = pos / SECTOR_SIZE;
        if index < DIRECT_CAP {
            Some(self.direct[index])
        } else if index < INDIRECT1_CAP {
            let indirect = load_index(device, cache, self.indirect);
            Some(indirect[index - DIRECT_CAP])
        } else {
            assert!(index < INDIRECT2_CAP);
            // 剔去直接与一级索引的部分
            let index = index - INDIRECT1_CAP;
            let root = load_index(device, cache, self.doubly_indirect);
            let indirect = load_index(device, cache, root[index / INDIRECT_COUNT]);
            Some(indirect[index % INDIRECT_COUNT])
        }
    }

    /// 把文件调整到 `new_len` 字节，保证恰好 `[0, new_len)` 的扇区在册。
    /// 失败时指针图与 `length` 均不变。
    pub fn resize(
        &mut self,
        new_len: usize,
        device: &Arc<dyn BlockDevice>,
        cache: &BlockCache,
        free_map: &dyn FreeMap,
    ) -> Result<(), Error> {
        assert!(new_len <= MAX_LENGTH);

        let old_sectors = Self::count_sectors(self.len());
        let new_sectors = Self::count_sectors(new_len);

        // 第一阶段：一次性申请全部新扇区，不够则整批退还
        let fresh_count = Self::count_fresh(old_sectors, new_sectors);
        let mut fresh = Vec::with_capacity(fresh_count);
        for _ in 0..fresh_count {
            match free_map.allocate(1) {
                Some(sector) => fresh.push(sector),
                None => {
                    for sector in fresh {
                        free_map.release(sector, 1);
                    }
                    return Err(Error::NoSpace);
                }
            }
        }
        let mut fresh = fresh.into_iter();

        // 第二阶段：提交指针编辑。
        // 新数据扇区经缓存清零，保证后续的部分写能看到确定的内容。
        let zeros = [0u8; SECTOR_SIZE];

        /******************** 直接索引 ********************/
        for i in 0..DIRECT_COUNT {
            if i < new_sectors && self.direct[i] == 0 {
                let sector = fresh.next().unwrap();
                cache.write(device, sector, &zeros);
                self.direct[i] = sector;
            } else if i >= new_sectors && self.direct[i] != 0 {
                free_map.release(self.direct[i], 1);
                self.direct[i] = 0;
            }
        }
        /******************** END ********************/

        /******************** 一级索引 ********************/
        if new_sectors > DIRECT_CAP || self.indirect != 0 {
            let mut index_block = if self.indirect == 0 {
                self.indirect = fresh.next().unwrap();
                [0; INDIRECT_COUNT]
            } else {
                load_index(device, cache, self.indirect)
            };

            for i in 0..INDIRECT_COUNT {
                let slot = DIRECT_CAP + i;
                if slot < new_sectors && index_block[i] == 0 {
                    let sector = fresh.next().unwrap();
                    cache.write(device, sector, &zeros);
                    index_block[i] = sector;
                } else if slot >= new_sectors && index_block[i] != 0 {
                    free_map.release(index_block[i], 1);
                    index_block[i] = 0;
                }
            }

            if new_sectors <= DIRECT_CAP {
                // 整个索引块不再使用
                free_map.release(self.indirect, 1);
                self.indirect = 0;
            } else {
                store_index(device, cache, self.indirect, &index_block);
            }
        }
        /******************** END ********************/

        /******************** 二级索引 ********************/
        if new_sectors > INDIRECT1_CAP || self.doubly_indirect != 0 {
            let mut root = if self.doubly_indirect == 0 {
                self.doubly_indirect = fresh.next().unwrap();
                [0; INDIRECT_COUNT]
            } else {
                load_index(device, cache, self.doubly_indirect)
            };

            for i in 0..INDIRECT_COUNT {
                let base = INDIRECT1_CAP + i * INDIRECT_COUNT;
                if root[i] == 0 && new_sectors <= base {
                    // 扇区连续在册，其后槽位必然全空
                    break;
                }

                let mut index_block = if root[i] == 0 {
                    root[i] = fresh.next().unwrap();
                    [0; INDIRECT_COUNT]
                } else {
                    load_index(device, cache, root[i])
                };

                for j in 0..INDIRECT_COUNT {
                    let slot = base + j;
                    if slot < new_sectors && index_block[j] == 0 {
                        let sector = fresh.next().unwrap();
                        cache.write(device, sector, &zeros);
                        index_block[j] = sector;
                    } else if slot >= new_sectors && index_block[j] != 0 {
                        free_map.release(index_block[j], 1);
                        index_block[j] = 0;
                    }
                }

                if new_sectors <= base {
                    free_map.release(root[i], 1);
                    root[i] = 0;
                } else {
                    store_index(device, cache, root[i], &index_block);
                }
            }

            if new_sectors <= INDIRECT1_CAP {
                free_map.release(self.doubly_indirect, 1);
                self.doubly_indirect = 0;
            } else {
                store_index(device, cache, self.doubly_indirect, &root);
            }
        }
        /******************** END ********************/

        assert!(fresh.next().is_none());
        self.length = new_len as i32;

        Ok(())
    }

    /// 计算容纳指定数据量需要多少个**数据扇区**
    #[inline]
    pub fn count_sectors(length: usize) -> usize {
        length.div_ceil(SECTOR_SIZE)
    }

    /// 计算容纳指定数据量需要多少个 **数据扇区** 和 **索引扇区**
    pub fn count_total_sectors(length: usize) -> usize {
        let data_sectors = Self::count_sectors(length);
        let mut total = data_sectors;

        // 超出直接索引，使用一级索引块
        if data_sectors > DIRECT_CAP {
            total += 1;
        }

        // 超出一级索引，使用二级索引根及其下属的一级索引块
        if data_sectors > INDIRECT1_CAP {
            total += 1 + (data_sectors - INDIRECT1_CAP).div_ceil(INDIRECT_COUNT);
        }

        total
    }

    /// 依据分配不变式（恰好 `[0, old)` 在册）算出扩容需要的新扇区数
    fn count_fresh(old_sectors: usize, new_sectors: usize) -> usize {
        if new_sectors <= old_sectors {
            return 0;
        }

        // 数据扇区
        let mut count = new_sectors - old_sectors;

        // 一级索引块
        if old_sectors <= DIRECT_CAP && new_sectors > DIRECT_CAP {
            count += 1;
        }
        // 二级索引根
        if old_sectors <= INDIRECT1_CAP && new_sectors > INDIRECT1_CAP {
            count += 1;
        }
        // 二级索引之下新进入使用的一级索引块
        let mut base = INDIRECT1_CAP;
        while base < new_sectors {
            if old_sectors <= base {
                count += 1;
            }
            base += INDIRECT_COUNT;
        }

        count
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), SECTOR_SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), SECTOR_SIZE) }
    }
}

/// 经缓存读入一个索引块
fn load_index(device: &Arc<dyn BlockDevice>, cache: &BlockCache, sector: u32) -> IndexBlock {
    assert_ne!(sector, 0);
    let mut buf: SectorBuf = [0; SECTOR_SIZE];
    cache.read(device, sector, &mut buf);
    unsafe { mem::transmute(buf) }
}

/// 经缓存写回一个索引块
fn store_index(
    device: &Arc<dyn BlockDevice>,
    cache: &BlockCache,
    sector: u32,
    block: &IndexBlock,
) {
    assert_ne!(sector, 0);
    let buf: SectorBuf = unsafe { mem::transmute(*block) };
    cache.write(device, sector, &buf);
}
