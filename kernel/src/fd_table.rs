//! # 文件描述符层
//!
//! 每进程一张定长描述符表。槽位 0/1/2 永久保留给标准输入、
//! 标准输出与标准错误，存放的是带标记的哨兵变体而非魔法指针。
//! 其余槽位要么指着文件句柄，要么指着目录句柄，二者必居其一。
//!
//! 一把锁保护槽位分配与查找；长 I/O 也在锁内进行——下游有
//! 每 inode 的读写锁，这里以简单为先。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;
use tree_fs::Dir;

use crate::FileHandle;
use crate::Kernel;

/// 每进程可打开的描述符上限
pub const MAX_OPEN: usize = 128;

pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;
pub const STDERR: usize = 2;

/// 描述符指向的对象
#[derive(Clone)]
pub enum Descriptor {
    /// 标准输入输出哨兵
    Stdio,
    File(Arc<FileHandle>),
    Dir(Arc<Dir>),
}

pub struct FdTable {
    inner: Mutex<FdTableInner>,
}

struct FdTableInner {
    slots: Vec<Option<Descriptor>>,
    /// 在用槽位计数（含保留的三个）
    open_count: usize,
    /// 下一次分配先试探的槽位
    next_fd: usize,
}

impl FdTable {
    pub fn new() -> Self {
        let mut slots: Vec<Option<Descriptor>> = (0..MAX_OPEN).map(|_| None).collect();
        slots[STDIN] = Some(Descriptor::Stdio);
        slots[STDOUT] = Some(Descriptor::Stdio);
        slots[STDERR] = Some(Descriptor::Stdio);

        Self {
            inner: Mutex::new(FdTableInner {
                slots,
                open_count: 3,
                next_fd: 3,
            }),
        }
    }

    /// 把句柄装入空槽位并返回描述符；表满时返回空。
    /// 从滚动提示位开始探测，越界则绕回槽位 3。
    pub fn insert(&self, descriptor: Descriptor) -> Option<usize> {
        let mut inner = self.inner.lock();

        if inner.open_count >= MAX_OPEN {
            return None;
        }

        let mut fd = inner.next_fd;
        while inner.slots[fd].is_some() {
            fd = (fd + 1) % MAX_OPEN;
            if fd <= STDERR {
                fd = STDERR + 1;
            }
        }

        inner.slots[fd] = Some(descriptor);
        inner.open_count += 1;
        inner.next_fd = if fd + 1 >= MAX_OPEN { STDERR + 1 } else { fd + 1 };

        Some(fd)
    }

    pub fn is_open(&self, fd: usize) -> bool {
        fd < MAX_OPEN && self.inner.lock().slots[fd].is_some()
    }

    pub fn read(&self, kernel: &Kernel, fd: usize, buf: &mut [u8]) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::Stdio) if fd == STDIN => {
                // 逐字符消费输入，直到凑满请求
                for byte in buf.iter_mut() {
                    *byte = kernel.console.getchar();
                }
                buf.len() as isize
            }
            Some(Descriptor::File(file)) => file.read(&kernel.fs, buf) as isize,
            _ => -1,
        }
    }

    pub fn write(&self, kernel: &Kernel, fd: usize, buf: &[u8]) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::Stdio) if fd == STDOUT || fd == STDERR => {
                // 按 256 字节的连续片段送往终端
                for chunk in buf.chunks(256) {
                    kernel.console.put_chunk(chunk);
                }
                buf.len() as isize
            }
            Some(Descriptor::File(file)) => file.write(&kernel.fs, buf) as isize,
            _ => -1,
        }
    }

    pub fn seek(&self, fd: usize, pos: usize) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::File(file)) => {
                file.seek(pos);
                0
            }
            _ => -1,
        }
    }

    pub fn tell(&self, fd: usize) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::File(file)) => file.tell() as isize,
            _ => -1,
        }
    }

    pub fn filesize(&self, kernel: &Kernel, fd: usize) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::File(file)) => file.len(&kernel.fs) as isize,
            _ => -1,
        }
    }

    /// 1 目录、0 文件、-1 非法
    pub fn isdir(&self, fd: usize) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::Dir(_)) => 1,
            Some(Descriptor::File(_)) => 0,
            _ => -1,
        }
    }

    /// 目录描述符的下一个子项名；`.` 与 `..` 不外露
    pub fn readdir(&self, kernel: &Kernel, fd: usize) -> Option<String> {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::Dir(dir)) => loop {
                let name = dir.read_next(&kernel.fs)?;
                if name != "." && name != ".." {
                    return Some(name);
                }
            },
            _ => None,
        }
    }

    pub fn inumber(&self, fd: usize) -> isize {
        let inner = self.inner.lock();
        match inner.get(fd) {
            Some(Descriptor::File(file)) => file.inode().sector() as isize,
            Some(Descriptor::Dir(dir)) => dir.inode().sector() as isize,
            _ => -1,
        }
    }

    /// 关闭描述符并归还槽位；保留槽位不可关闭
    pub fn close(&self, kernel: &Kernel, fd: usize) -> isize {
        let mut inner = self.inner.lock();

        if fd <= STDERR || fd >= MAX_OPEN {
            return -1;
        }
        let Some(descriptor) = inner.slots[fd].take() else {
            return -1;
        };
        inner.open_count -= 1;

        match descriptor {
            Descriptor::File(file) => file.close(&kernel.fs),
            Descriptor::Dir(dir) => dir.close(&kernel.fs),
            Descriptor::Stdio => unreachable!(),
        }

        0
    }

    /// 进程退出时同步排空 3 号及之后的槽位
    pub fn close_all(&self, kernel: &Kernel) {
        let mut inner = self.inner.lock();

        for fd in STDERR + 1..MAX_OPEN {
            match inner.slots[fd].take() {
                Some(Descriptor::File(file)) => file.close(&kernel.fs),
                Some(Descriptor::Dir(dir)) => dir.close(&kernel.fs),
                _ => (),
            }
        }
        inner.open_count = 3;
        inner.next_fd = 3;
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTableInner {
    fn get(&self, fd: usize) -> Option<&Descriptor> {
        if fd >= MAX_OPEN {
            return None;
        }
        self.slots[fd].as_ref()
    }
}
