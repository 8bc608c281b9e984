//! # 索引节点层
//!
//! 每个被打开的磁盘 inode 在内存中只有一个影子 [`Inode`]，
//! 由打开表（见 [`Filesystem`]）按所在扇区去重，打开者共享之。
//!
//! 数据读写由每个 inode 的读写锁串行化；打开计数、删除标记、
//! 拒写计数与扩缩容统一由元数据锁保护。

use alloc::sync::Arc;

use spin::{Mutex, RwLock};
use vfs::InodeKind;

use crate::layout::DiskInode;
use crate::Filesystem;
use crate::SECTOR_SIZE;

/// 表示一个打开的磁盘 inode
pub struct Inode {
    /// inode 所在扇区，即 inode 编号
    sector: u32,
    /// 数据读写锁
    rw: RwLock<()>,
    /// 元数据锁，兼作扩缩容的串行化
    meta: Mutex<InodeMeta>,
}

struct InodeMeta {
    open_count: usize,
    /// 置位后，最后一个关闭者负责释放全部扇区
    removed: bool,
    deny_write_count: usize,
}

impl Inode {
    pub(crate) fn new(sector: u32) -> Self {
        Self {
            sector,
            rw: RwLock::new(()),
            meta: Mutex::new(InodeMeta {
                open_count: 1,
                removed: false,
                deny_write_count: 0,
            }),
        }
    }

    /// 在 `sector` 处建立一个长度为 `length` 的新 inode 并写穿缓存。
    /// 失败时磁盘上不会留下任何新分配。
    pub fn create(
        fs: &Filesystem,
        sector: u32,
        length: usize,
        kind: InodeKind,
    ) -> Result<(), vfs::Error> {
        let mut disk = DiskInode::new(kind);
        disk.resize(length, &fs.device, &fs.cache, &*fs.free_map)?;
        fs.cache.write(&fs.device, sector, disk.as_bytes());
        Ok(())
    }

    /// 同一打开者再度持有，打开计数加一
    pub fn reopen(&self) {
        self.meta.lock().open_count += 1;
    }

    #[inline]
    pub fn sector(&self) -> u32 {
        self.sector
    }

    /// 从指定位置读出数据填充 `buf`，返回实际读到的字节数；
    /// 短读表示到达文件末尾。
    pub fn read_at(&self, fs: &Filesystem, offset: usize, buf: &mut [u8]) -> usize {
        let _guard = self.rw.read();
        let disk = self.load(fs);

        let mut start = offset;
        let end = (offset + buf.len()).min(disk.len());
        if start >= end {
            return 0;
        }

        let mut read_size = 0;
        while start < end {
            let sector_ofs = start % SECTOR_SIZE;
            // 分块上限：剩余请求、扇区余量、文件余量三者最小
            let chunk = (end - start).min(SECTOR_SIZE - sector_ofs);
            let Some(sector) = disk.sector_of(start, &fs.device, &fs.cache) else {
                break;
            };

            let dst = &mut buf[read_size..read_size + chunk];
            if sector_ofs == 0 && chunk == SECTOR_SIZE {
                fs.cache.read(&fs.device, sector, dst);
            } else {
                fs.cache.read_offset(&fs.device, sector, dst, sector_ofs, chunk);
            }

            start += chunk;
            read_size += chunk;
        }

        read_size
    }

    /// 从指定位置写入 `buf`，必要时先扩容到 `offset + buf.len()`。
    /// 拒写计数非零时直接返回 0；扩容失败则按旧长度截断（短写）。
    pub fn write_at(&self, fs: &Filesystem, offset: usize, buf: &[u8]) -> usize {
        if self.meta.lock().deny_write_count > 0 {
            return 0;
        }

        let _guard = self.rw.write();
        let mut disk = self.load(fs);

        if offset + buf.len() > disk.len() {
            let _meta = self.meta.lock();
            if disk
                .resize(offset + buf.len(), &fs.device, &fs.cache, &*fs.free_map)
                .is_ok()
            {
                // 新长度随 inode 本体写穿缓存而持久化
                fs.cache.write(&fs.device, self.sector, disk.as_bytes());
            }
        }

        let mut start = offset;
        let end = (offset + buf.len()).min(disk.len());
        if start >= end {
            return 0;
        }

        let mut written_size = 0;
        while start < end {
            let sector_ofs = start % SECTOR_SIZE;
            let chunk = (end - start).min(SECTOR_SIZE - sector_ofs);
            let Some(sector) = disk.sector_of(start, &fs.device, &fs.cache) else {
                break;
            };

            let src = &buf[written_size..written_size + chunk];
            if sector_ofs == 0 && chunk == SECTOR_SIZE {
                fs.cache.write(&fs.device, sector, src);
            } else {
                fs.cache.write_offset(&fs.device, sector, src, sector_ofs, chunk);
            }

            start += chunk;
            written_size += chunk;
        }

        written_size
    }

    /// 文件字节数
    pub fn len(&self, fs: &Filesystem) -> usize {
        self.load(fs).len()
    }

    pub fn is_empty(&self, fs: &Filesystem) -> bool {
        self.len(fs) == 0
    }

    pub fn kind(&self, fs: &Filesystem) -> InodeKind {
        self.load(fs).kind()
    }

    /// 标记删除；空间待最后一个关闭者释放
    pub fn mark_removed(&self) {
        self.meta.lock().removed = true;
    }

    /// 拒绝写入。每个打开者至多调用一次。
    pub fn deny_write(&self) {
        let mut meta = self.meta.lock();
        meta.deny_write_count += 1;
        assert!(meta.deny_write_count <= meta.open_count);
    }

    /// 恢复写入。与 [`Inode::deny_write`] 一一配对。
    pub fn allow_write(&self) {
        let mut meta = self.meta.lock();
        assert!(meta.deny_write_count > 0);
        meta.deny_write_count -= 1;
    }

    /// 读取 inode 对磁盘的映射
    pub(crate) fn load(&self, fs: &Filesystem) -> DiskInode {
        let mut disk = DiskInode::new(InodeKind::File);
        fs.cache.read(&fs.device, self.sector, disk.as_bytes_mut());
        assert!(disk.is_valid(), "corrupted inode at sector {}", self.sector);
        disk
    }
}

impl Filesystem {
    /// 打开 `sector` 处的 inode：已在打开表中则共享句柄并增加计数，
    /// 否则建立新句柄并登记。
    pub fn open_inode(&self, sector: u32) -> Arc<Inode> {
        let mut open_inodes = self.open_inodes.lock();

        if let Some((_, inode)) = open_inodes.iter().find(|(opened, _)| *opened == sector) {
            let inode = inode.clone();
            inode.meta.lock().open_count += 1;
            return inode;
        }

        let inode = Arc::new(Inode::new(sector));
        open_inodes.push((sector, inode.clone()));
        inode
    }

    /// 释放一次打开。计数归零时注销句柄；此前若被标记删除，
    /// 则缩容到零并退还 inode 本体扇区。
    pub fn close_inode(&self, inode: &Arc<Inode>) {
        let mut open_inodes = self.open_inodes.lock();
        let mut meta = inode.meta.lock();

        assert!(meta.open_count > 0);
        meta.open_count -= 1;
        if meta.open_count > 0 {
            return;
        }

        open_inodes.retain(|(opened, _)| *opened != inode.sector);

        if meta.removed {
            let mut disk = inode.load(self);
            disk.resize(0, &self.device, &self.cache, &*self.free_map)
                .expect("shrinking never allocates");
            self.free_map.release(inode.sector, 1);
        }
    }
}
