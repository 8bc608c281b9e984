//! # 进程层
//!
//! 进程控制块聚合了描述符表与当前工作目录；
//! 父子进程之间以一份引用计数的**等待记录**交换退出码：
//! 子进程退出时公布退出码并抬起等待信号量，
//! 父进程在信号量上等待，且凭一票许可至多成功等待一次。
//!
//! 加载器、用户栈与调度器是外部协作者：子进程的执行体由嵌入方驱动。

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};
use tree_fs::{Dir, Filesystem};

use crate::sync::Semaphore;
use crate::FdTable;
use crate::Kernel;

/// 进程控制块
pub struct Process {
    pid: usize,
    /// 文件描述符表
    pub fd_table: FdTable,
    /// 当前工作目录，进程退出后为空
    cwd: Mutex<Option<Dir>>,
    /// 各子进程共享来的等待记录
    children: Mutex<Vec<Arc<WaitRecord>>>,
    /// 自身作为子进程的等待记录
    wait_record: Option<Arc<WaitRecord>>,
}

/// 父子进程共享的等待记录
struct WaitRecord {
    child_pid: usize,
    state: Mutex<WaitState>,
    /// 父进程在此等待子进程退出
    wait: Semaphore,
    /// 一票许可：等待至多成功一次
    once: Semaphore,
}

struct WaitState {
    exit_code: i32,
    dead: bool,
}

impl Process {
    /// 初始进程，cwd 为根目录
    pub fn init(fs: &Filesystem, pid: usize) -> Arc<Self> {
        Arc::new(Self {
            pid,
            fd_table: FdTable::new(),
            cwd: Mutex::new(Some(fs.root_dir())),
            children: Mutex::new(Vec::new()),
            wait_record: None,
        })
    }

    /// 派生子进程：继承 cwd，与父进程共享一份新的等待记录
    pub fn spawn(self: &Arc<Self>, pid: usize) -> Arc<Process> {
        let record = Arc::new(WaitRecord {
            child_pid: pid,
            state: Mutex::new(WaitState {
                exit_code: 0,
                dead: false,
            }),
            wait: Semaphore::new(0),
            once: Semaphore::new(1),
        });
        self.children.lock().push(record.clone());

        let cwd = self.cwd.lock().as_ref().map(Dir::reopen);

        Arc::new(Self {
            pid,
            fd_table: FdTable::new(),
            cwd: Mutex::new(cwd),
            children: Mutex::new(Vec::new()),
            wait_record: Some(record),
        })
    }

    #[inline]
    pub fn pid(&self) -> usize {
        self.pid
    }

    /// 当前工作目录的 inode 扇区
    pub fn cwd_sector(&self) -> Option<u32> {
        self.cwd.lock().as_ref().map(|dir| dir.inode().sector())
    }

    pub(crate) fn cwd(&self) -> MutexGuard<'_, Option<Dir>> {
        self.cwd.lock()
    }

    /// 更换当前工作目录并归还旧目录
    pub(crate) fn chdir(&self, fs: &Filesystem, dir: Dir) {
        let mut cwd = self.cwd.lock();
        if let Some(old) = cwd.take() {
            old.close(fs);
        }
        *cwd = Some(dir);
    }

    /// 等待指定子进程退出并取其退出码。
    /// 不是自己的子进程、或已经成功等待过，都立即返回 -1。
    pub fn wait(&self, pid: usize) -> i32 {
        let record = {
            let children = self.children.lock();
            let Some(record) = children.iter().find(|record| record.child_pid == pid) else {
                return -1;
            };
            record.clone()
        };

        if !record.once.try_down() {
            return -1;
        }
        record.wait.down();

        let state = record.state.lock();
        assert!(state.dead);
        state.exit_code
    }

    /// 进程退出：同步排空描述符表、归还 cwd、公布退出码并唤醒等待者。
    /// 因内核故障或参数校验失败而终止的进程以 -1 调用。
    pub fn exit(&self, kernel: &Kernel, code: i32) {
        log::info!("pid {}: exit({})", self.pid, code);

        self.fd_table.close_all(kernel);
        if let Some(cwd) = self.cwd.lock().take() {
            cwd.close(&kernel.fs);
        }
        // 子进程记录随之解除共享
        self.children.lock().clear();

        if let Some(record) = &self.wait_record {
            let mut state = record.state.lock();
            state.exit_code = code;
            state.dead = true;
            drop(state);
            record.wait.up();
        }
    }
}
