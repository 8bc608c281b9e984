//! # 目录层
//!
//! 目录就是数据为 [`DirEntry`] 数组的 inode。
//! 任何目录的前两项都是 `.`（自身）与 `..`（父目录），
//! 根目录的父目录是它自己。`..` 只记录父目录的扇区编号，
//! 按需查询，绝不持有引用。

use alloc::string::String;
use alloc::string::ToString;
use alloc::sync::Arc;

use spin::Mutex;
use vfs::{Error, InodeKind};

use crate::layout::DirEntry;
use crate::Filesystem;
use crate::Inode;

/// 表示一个打开的目录
pub struct Dir {
    inode: Arc<Inode>,
    /// readdir 游标：下一个待检查的目录项序号
    cursor: Mutex<usize>,
}

impl Dir {
    /// 在 `sector` 处建立一个新目录，预留 `entries_hint` 个目录项的空间，
    /// 并写入 `.` 与 `..`。
    pub fn create(
        fs: &Filesystem,
        sector: u32,
        parent_sector: u32,
        entries_hint: usize,
    ) -> Result<(), Error> {
        assert!(entries_hint >= 2);
        Inode::create(fs, sector, entries_hint * DirEntry::SIZE, InodeKind::Directory)?;

        let dir = Self {
            inode: fs.open_inode(sector),
            cursor: Mutex::new(0),
        };
        dir.write_entry(fs, 0, &DirEntry::new(".", sector));
        dir.write_entry(fs, 1, &DirEntry::new("..", parent_sector));
        dir.close(fs);

        Ok(())
    }

    /// 把 inode 句柄当作目录打开；类型不符时归还句柄
    pub fn open(fs: &Filesystem, inode: Arc<Inode>) -> Result<Self, Error> {
        if inode.kind(fs) != InodeKind::Directory {
            fs.close_inode(&inode);
            return Err(Error::NotADirectory);
        }

        Ok(Self {
            inode,
            cursor: Mutex::new(0),
        })
    }

    /// 再度打开同一目录，游标独立
    pub fn reopen(&self) -> Self {
        self.inode.reopen();
        Self {
            inode: self.inode.clone(),
            cursor: Mutex::new(0),
        }
    }

    /// 归还底层 inode 的这次打开
    pub fn close(&self, fs: &Filesystem) {
        fs.close_inode(&self.inode);
    }

    #[inline]
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    /// 根据名字获取子项的 inode 句柄
    pub fn lookup(&self, fs: &Filesystem, name: &str) -> Option<Arc<Inode>> {
        self.find(fs, name)
            .map(|(_, entry)| fs.open_inode(entry.sector()))
    }

    /// 登记一个子项。名字在目录内必须唯一。
    pub fn add(&self, fs: &Filesystem, name: &str, sector: u32) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::NotFound);
        }
        if self.find(fs, name).is_some() {
            return Err(Error::AlreadyExists);
        }

        // 优先复用空闲槽位，没有则在末尾扩出新槽位
        let index = (0..self.entry_count(fs))
            .find(|&index| !self.entry_at(fs, index).is_in_use())
            .unwrap_or_else(|| self.entry_count(fs));

        let entry = DirEntry::new(name, sector);
        let written = self
            .inode
            .write_at(fs, index * DirEntry::SIZE, entry.as_bytes());
        if written != DirEntry::SIZE {
            return Err(Error::NoSpace);
        }

        Ok(())
    }

    /// 注销一个子项（只腾出槽位，inode 的去留由调用方决定）
    pub fn remove(&self, fs: &Filesystem, name: &str) -> Result<Arc<Inode>, Error> {
        assert!(name != "." && name != "..");
        let (index, mut entry) = self.find(fs, name).ok_or(Error::NotFound)?;

        let inode = fs.open_inode(entry.sector());
        entry.clear();
        self.write_entry(fs, index, &entry);

        Ok(inode)
    }

    /// 下一个在册目录项的名字；`.` 与 `..` 照常返回，由上层过滤
    pub fn read_next(&self, fs: &Filesystem) -> Option<String> {
        let mut cursor = self.cursor.lock();
        let count = self.entry_count(fs);

        while *cursor < count {
            let entry = self.entry_at(fs, *cursor);
            *cursor += 1;
            if entry.is_in_use() {
                return Some(entry.name().to_string());
            }
        }

        None
    }

    /// 除 `.` 与 `..` 外没有任何子项
    pub fn is_empty(&self, fs: &Filesystem) -> bool {
        (0..self.entry_count(fs))
            .map(|index| self.entry_at(fs, index))
            .filter(DirEntry::is_in_use)
            .all(|entry| entry.name() == "." || entry.name() == "..")
    }

    /// 本目录的父目录扇区
    pub fn parent_sector(&self, fs: &Filesystem) -> u32 {
        let (_, entry) = self.find(fs, "..").expect("every directory has `..`");
        entry.sector()
    }
}

impl Dir {
    fn entry_count(&self, fs: &Filesystem) -> usize {
        self.inode.len(fs) / DirEntry::SIZE
    }

    fn entry_at(&self, fs: &Filesystem, index: usize) -> DirEntry {
        let mut entry = DirEntry::default();
        assert_eq!(
            self.inode
                .read_at(fs, index * DirEntry::SIZE, entry.as_bytes_mut()),
            DirEntry::SIZE
        );
        entry
    }

    fn write_entry(&self, fs: &Filesystem, index: usize, entry: &DirEntry) {
        assert_eq!(
            self.inode.write_at(fs, index * DirEntry::SIZE, entry.as_bytes()),
            DirEntry::SIZE
        );
    }

    /// 在目录项中按名字查找
    fn find(&self, fs: &Filesystem, name: &str) -> Option<(usize, DirEntry)> {
        (0..self.entry_count(fs))
            .map(|index| (index, self.entry_at(fs, index)))
            .find(|(_, entry)| entry.is_in_use() && entry.name() == name)
    }
}
