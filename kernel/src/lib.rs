//! # 进程侧文件系统
//!
//! ## 分层（自上而下）
//!
//! 1. 系统调用层：校验参数并把内部错误翻译成标量返回值
//! 2. 文件描述符层：每进程 128 个槽位，0/1/2 保留给标准输入输出
//! 3. 进程层：进程控制块、当前工作目录、等待记录
//!
//! 其下游是 `tree-fs` 的路径解析、目录与索引节点层。
//! 调度器、加载器与终端驱动都是外部协作者，以特质注入。

#![no_std]

extern crate alloc;

mod console;
mod fd_table;
mod file;
mod process;
pub mod sync;
pub mod syscall;

use alloc::sync::Arc;

pub use console::Console;
pub use fd_table::{Descriptor, FdTable, MAX_OPEN, STDERR, STDIN, STDOUT};
pub use file::FileHandle;
pub use process::Process;

use tree_fs::Filesystem;

/// 系统调用层的注入上下文
pub struct Kernel {
    pub fs: Arc<Filesystem>,
    pub console: Arc<dyn Console>,
}
