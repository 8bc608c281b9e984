//! # 文件系统上下文
//!
//! 把设备、块缓存、空闲图与打开表聚合成一个可注入的值，
//! 而非一组环境全局量；测试可以替换其中任何协作者。

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::Bitmap;
use crate::BlockCache;
use crate::BlockDevice;
use crate::Dir;
use crate::FreeMap;
use crate::Inode;
use crate::ROOT_SECTOR;

pub struct Filesystem {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) cache: Arc<BlockCache>,
    pub(crate) free_map: Arc<dyn FreeMap>,
    /// 打开表：当下每个打开的 inode 扇区至多对应一个句柄
    pub(crate) open_inodes: Mutex<Vec<(u32, Arc<Inode>)>>,
}

impl Filesystem {
    /// 在空设备上建立文件系统：扇区 0 为空闲图，扇区 1 为根目录
    pub fn format(device: Arc<dyn BlockDevice>, total_sectors: u32) -> Arc<Self> {
        let cache = Arc::new(BlockCache::new());
        let free_map = Arc::new(Bitmap::format(device.clone(), cache.clone(), total_sectors));
        let fs = Self::assemble(device, cache, free_map);

        assert_eq!(fs.free_map.allocate(1), Some(crate::FREE_MAP_SECTOR));
        assert_eq!(fs.free_map.allocate(1), Some(ROOT_SECTOR));
        Dir::create(&fs, ROOT_SECTOR, ROOT_SECTOR, 16).expect("creating root directory");
        fs.flush();

        fs
    }

    /// 挂载既有文件系统并校验根目录
    pub fn mount(device: Arc<dyn BlockDevice>, total_sectors: u32) -> Arc<Self> {
        let cache = Arc::new(BlockCache::new());
        let free_map = Arc::new(Bitmap::new(device.clone(), cache.clone(), total_sectors));
        let fs = Self::assemble(device, cache, free_map);

        let root = fs.open_inode(ROOT_SECTOR);
        assert!(root.load(&fs).is_dir(), "root directory is corrupted");
        fs.close_inode(&root);

        fs
    }

    /// 以外部提供的空闲图建立文件系统，仅供注入测试替身使用
    pub fn format_with(device: Arc<dyn BlockDevice>, free_map: Arc<dyn FreeMap>) -> Arc<Self> {
        let fs = Self::assemble(device, Arc::new(BlockCache::new()), free_map);

        assert_eq!(fs.free_map.allocate(1), Some(crate::FREE_MAP_SECTOR));
        assert_eq!(fs.free_map.allocate(1), Some(ROOT_SECTOR));
        Dir::create(&fs, ROOT_SECTOR, ROOT_SECTOR, 16).expect("creating root directory");
        fs.flush();

        fs
    }

    /// 打开根目录
    pub fn root_dir(&self) -> Dir {
        Dir::open(self, self.open_inode(ROOT_SECTOR)).expect("root is always a directory")
    }

    pub fn free_map(&self) -> &Arc<dyn FreeMap> {
        &self.free_map
    }

    /// 把缓存中的脏块全部写回设备
    pub fn flush(&self) {
        self.cache.flush();
    }

    /// 写回并废弃全部缓存
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    fn assemble(
        device: Arc<dyn BlockDevice>,
        cache: Arc<BlockCache>,
        free_map: Arc<dyn FreeMap>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            cache,
            free_map,
            open_inodes: Mutex::new(Vec::new()),
        })
    }
}
