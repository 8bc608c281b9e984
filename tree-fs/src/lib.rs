//! # 持久化树形文件系统
//!
//! 整体架构，自上而下：
//!
//! 1. 路径解析层：把文本路径翻译成目录与 inode 句柄
//! 2. 目录层：把目录 inode 的数据当作定长目录项数组使用
//! 3. 索引节点层：多级索引、在线扩缩容、打开表与延迟删除
//! 4. 块缓存层：有界、写回、按最久未触碰驱逐
//! 5. 块设备接口层：读写扇区设备的接口
//!
//! 锁序（只允许按此顺序下降）：
//! 打开表锁 → inode 读写锁 → inode 元数据锁 → 空闲图锁 → 块缓存锁

#![no_std]

extern crate alloc;

// 路径解析层
pub mod path;

// 目录层
mod directory;
pub use directory::Dir;

// 索引节点层
mod inode;
pub use inode::Inode;

// 文件系统上下文：设备、缓存、空闲图、打开表
mod fs;
pub use fs::Filesystem;

// 磁盘数据结构层
mod layout;
pub use layout::{DirEntry, DiskInode, MAX_LENGTH};

// 块缓存层
mod block_cache;
pub use block_cache::BlockCache;

// 块设备接口层
mod block_dev;
pub use block_dev::BlockDevice;

// 空闲扇区图：外部协作者契约与默认位图实现
mod bitmap;
mod free_map;
pub use bitmap::Bitmap;
pub use free_map::FreeMap;

pub const SECTOR_SIZE: usize = 512;
/// 一个扇区能表示的位数
pub const SECTOR_BITS: usize = SECTOR_SIZE * 8;
/// 路径分量的最大长度
pub const NAME_MAX: usize = 26;
/// 空闲图所占的扇区
pub const FREE_MAP_SECTOR: u32 = 0;
/// 根目录 inode 所在的扇区
pub const ROOT_SECTOR: u32 = 1;

type SectorBuf = [u8; SECTOR_SIZE];
