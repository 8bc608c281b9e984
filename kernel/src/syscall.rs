//! 文件与进程相关的系统调用
//!
//! 在这一层完成参数校验，并把内部的 `Option`/`Result`
//! 翻译成面向用户的标量返回值（-1 / false / 短写）。
//! 操作一律就地失败，进程继续运行。

use alloc::string::String;
use alloc::sync::Arc;

use tree_fs::{path, Dir, Filesystem, Inode};
use vfs::InodeKind;

use crate::Descriptor;
use crate::FileHandle;
use crate::Kernel;
use crate::Process;
use crate::MAX_OPEN;

/// 在路径处建立指定初始大小的普通文件
pub fn sys_create(kernel: &Kernel, process: &Process, path: &str, size: usize) -> bool {
    let fs = &kernel.fs;
    if path.is_empty() {
        return false;
    }

    let Some(name) = path::basename(path) else {
        return false;
    };
    if name.is_empty() {
        return false;
    }

    let cwd = process.cwd();
    let Some(dir) = path::dir_of(fs, cwd.as_ref(), path) else {
        return false;
    };

    let created = create_at(fs, &dir, name, size);
    dir.close(fs);
    created
}

/// 删除路径指向的文件或空目录。
/// 根目录、非空目录、以及调用者的当前工作目录都拒绝删除；
/// 仍被打开的 inode 的空间要等最后一次关闭才释放。
pub fn sys_remove(kernel: &Kernel, process: &Process, path: &str) -> bool {
    let fs = &kernel.fs;
    if path.is_empty() {
        return false;
    }

    let cwd = process.cwd();
    let Some(inode) = path::inode_of(fs, cwd.as_ref(), path) else {
        return false;
    };

    match inode.kind(fs) {
        InodeKind::File => {
            fs.close_inode(&inode);
            remove_at(fs, cwd.as_ref(), path)
        }
        InodeKind::Directory => {
            let sector = inode.sector();
            let Ok(dir) = Dir::open(fs, inode) else {
                return false;
            };
            let mut removable = dir.is_empty(fs);
            if sector == tree_fs::ROOT_SECTOR {
                removable = false;
            }
            // cwd 锁已在手，不得经 cwd_sector 重入
            if cwd.as_ref().map(|cwd| cwd.inode().sector()) == Some(sector) {
                removable = false;
            }
            dir.close(fs);

            removable && remove_at(fs, cwd.as_ref(), path)
        }
    }
}

/// 打开文件或目录，返回描述符；任何失败都是 -1
pub fn sys_open(kernel: &Kernel, process: &Process, path: &str) -> isize {
    let fs = &kernel.fs;
    if path.is_empty() {
        return -1;
    }

    let cwd = process.cwd();
    let Some(inode) = path::inode_of(fs, cwd.as_ref(), path) else {
        return -1;
    };
    drop(cwd);

    let descriptor = match inode.kind(fs) {
        InodeKind::File => Descriptor::File(Arc::new(FileHandle::open(inode))),
        InodeKind::Directory => match Dir::open(fs, inode) {
            Ok(dir) => Descriptor::Dir(Arc::new(dir)),
            Err(_) => return -1,
        },
    };

    match process.fd_table.insert(descriptor.clone()) {
        Some(fd) => fd as isize,
        None => {
            // 描述符表已满，归还刚打开的句柄
            match descriptor {
                Descriptor::File(file) => file.close(fs),
                Descriptor::Dir(dir) => dir.close(fs),
                Descriptor::Stdio => unreachable!(),
            }
            -1
        }
    }
}

pub fn sys_filesize(kernel: &Kernel, process: &Process, fd: usize) -> isize {
    if fd >= MAX_OPEN {
        log::error!("fd={fd} is outbound");
        return -1;
    }
    process.fd_table.filesize(kernel, fd)
}

pub fn sys_read(kernel: &Kernel, process: &Process, fd: usize, buf: &mut [u8]) -> isize {
    if fd >= MAX_OPEN {
        log::error!("fd={fd} is outbound");
        return -1;
    }
    process.fd_table.read(kernel, fd, buf)
}

pub fn sys_write(kernel: &Kernel, process: &Process, fd: usize, buf: &[u8]) -> isize {
    if fd >= MAX_OPEN {
        log::error!("fd={fd} is outbound");
        return -1;
    }
    process.fd_table.write(kernel, fd, buf)
}

pub fn sys_seek(process: &Process, fd: usize, pos: usize) -> isize {
    if fd >= MAX_OPEN {
        return -1;
    }
    process.fd_table.seek(fd, pos)
}

pub fn sys_tell(process: &Process, fd: usize) -> isize {
    if fd >= MAX_OPEN {
        return -1;
    }
    process.fd_table.tell(fd)
}

pub fn sys_close(kernel: &Kernel, process: &Process, fd: usize) -> isize {
    process.fd_table.close(kernel, fd)
}

/// 更换当前工作目录
pub fn sys_chdir(kernel: &Kernel, process: &Process, path: &str) -> bool {
    let fs = &kernel.fs;

    let inode = {
        let cwd = process.cwd();
        let Some(inode) = path::inode_of(fs, cwd.as_ref(), path) else {
            return false;
        };
        inode
    };

    let Ok(dir) = Dir::open(fs, inode) else {
        return false;
    };
    process.chdir(fs, dir);

    true
}

/// 建立新目录；父目录必须已经存在
pub fn sys_mkdir(kernel: &Kernel, process: &Process, path: &str) -> bool {
    let fs = &kernel.fs;
    if path.is_empty() {
        return false;
    }

    let Some(name) = path::basename(path) else {
        return false;
    };
    if name.is_empty() {
        return false;
    }

    let cwd = process.cwd();
    let Some(parent) = path::dir_of(fs, cwd.as_ref(), path) else {
        return false;
    };

    let created = mkdir_at(fs, &parent, name);
    parent.close(fs);
    created
}

/// 目录描述符的下一个子项名，`.` 与 `..` 已被滤去
pub fn sys_readdir(kernel: &Kernel, process: &Process, fd: usize) -> Option<String> {
    if fd >= MAX_OPEN {
        return None;
    }
    process.fd_table.readdir(kernel, fd)
}

pub fn sys_isdir(process: &Process, fd: usize) -> isize {
    if fd >= MAX_OPEN {
        return -1;
    }
    process.fd_table.isdir(fd)
}

pub fn sys_inumber(process: &Process, fd: usize) -> isize {
    if fd >= MAX_OPEN {
        return -1;
    }
    process.fd_table.inumber(fd)
}

/// 等待子进程退出
pub fn sys_wait(process: &Process, pid: usize) -> i32 {
    process.wait(pid)
}

/// 以用户给定的退出码结束进程
pub fn sys_exit(kernel: &Kernel, process: &Process, code: i32) {
    process.exit(kernel, code);
}

/// 关机前把缓存全部写回
pub fn sys_halt(kernel: &Kernel) {
    kernel.fs.flush();
}

pub fn sys_practice(num: i32) -> i32 {
    num + 1
}

fn create_at(fs: &Filesystem, dir: &Dir, name: &str, size: usize) -> bool {
    let Some(sector) = fs.free_map().allocate(1) else {
        return false;
    };

    if Inode::create(fs, sector, size, InodeKind::File).is_err() {
        fs.free_map().release(sector, 1);
        return false;
    }

    if dir.add(fs, name, sector).is_err() {
        // 回滚：连同已铺好的数据扇区一起退还
        let inode = fs.open_inode(sector);
        inode.mark_removed();
        fs.close_inode(&inode);
        return false;
    }

    true
}

fn mkdir_at(fs: &Filesystem, parent: &Dir, name: &str) -> bool {
    let Some(sector) = fs.free_map().allocate(1) else {
        return false;
    };

    if Dir::create(fs, sector, parent.inode().sector(), 16).is_err() {
        fs.free_map().release(sector, 1);
        return false;
    }

    if parent.add(fs, name, sector).is_err() {
        let inode = fs.open_inode(sector);
        inode.mark_removed();
        fs.close_inode(&inode);
        return false;
    }

    true
}

fn remove_at(fs: &Filesystem, cwd: Option<&Dir>, path: &str) -> bool {
    let Some(name) = path::basename(path) else {
        return false;
    };
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }

    let Some(dir) = path::dir_of(fs, cwd, path) else {
        return false;
    };

    let removed = match dir.remove(fs, name) {
        Ok(inode) => {
            inode.mark_removed();
            fs.close_inode(&inode);
            true
        }
        Err(_) => false,
    };

    dir.close(fs);
    removed
}
