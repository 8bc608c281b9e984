//! 带读写位置的文件句柄

use alloc::sync::Arc;

use spin::Mutex;
use tree_fs::{Filesystem, Inode};

/// 表示进程打开的一个文件：共享的 inode 加上本句柄私有的游标
pub struct FileHandle {
    inode: Arc<Inode>,
    inner: Mutex<FileInner>,
}

struct FileInner {
    /// 文件内的字节偏移
    pos: usize,
    /// 本句柄是否对 inode 施加了拒写
    denied: bool,
}

impl FileHandle {
    pub fn open(inode: Arc<Inode>) -> Self {
        Self {
            inode,
            inner: Mutex::new(FileInner {
                pos: 0,
                denied: false,
            }),
        }
    }

    #[inline]
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    /// 从当前位置读出并推进游标，短读表示文件尾
    pub fn read(&self, fs: &Filesystem, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.lock();
        let read_size = self.inode.read_at(fs, inner.pos, buf);
        inner.pos += read_size;
        read_size
    }

    /// 写入当前位置并推进游标
    pub fn write(&self, fs: &Filesystem, buf: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        let written_size = self.inode.write_at(fs, inner.pos, buf);
        inner.pos += written_size;
        written_size
    }

    pub fn seek(&self, pos: usize) {
        self.inner.lock().pos = pos;
    }

    pub fn tell(&self) -> usize {
        self.inner.lock().pos
    }

    pub fn len(&self, fs: &Filesystem) -> usize {
        self.inode.len(fs)
    }

    pub fn is_empty(&self, fs: &Filesystem) -> bool {
        self.len(fs) == 0
    }

    /// 装载期间保护可执行文件。每个句柄至多生效一次。
    pub fn deny_write(&self) {
        let mut inner = self.inner.lock();
        if !inner.denied {
            inner.denied = true;
            self.inode.deny_write();
        }
    }

    pub fn allow_write(&self) {
        let mut inner = self.inner.lock();
        if inner.denied {
            inner.denied = false;
            self.inode.allow_write();
        }
    }

    /// 归还 inode 的这次打开；施加过的拒写一并撤销
    pub fn close(&self, fs: &Filesystem) {
        self.allow_write();
        fs.close_inode(&self.inode);
    }
}
