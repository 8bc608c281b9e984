//! # 磁盘数据结构层
//!
//! 表示磁盘文件系统的数据结构：inode 与目录项。
//! 布局按扇区粒度固定，小端序。

mod dir_entry;
mod inode;

pub use self::{
    dir_entry::DirEntry,
    inode::{DiskInode, MAX_LENGTH},
};
