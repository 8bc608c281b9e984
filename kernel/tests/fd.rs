//! 文件描述符层与系统调用面的测试

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use kernel::syscall::*;
use kernel::{Console, Kernel, Process, MAX_OPEN};
use tree_fs::{Filesystem, ROOT_SECTOR};
use tree_fs_fuse::MemDisk;

/// 以内存队列冒充终端
struct TestConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl TestConsole {
    fn new() -> Self {
        Self {
            input: Mutex::new(VecDeque::new()),
            output: Mutex::new(Vec::new()),
        }
    }

    fn feed(&self, bytes: &[u8]) {
        self.input.lock().unwrap().extend(bytes);
    }

    fn taken(&self) -> Vec<u8> {
        self.output.lock().unwrap().clone()
    }
}

impl Console for TestConsole {
    fn getchar(&self) -> u8 {
        self.input.lock().unwrap().pop_front().unwrap_or(0)
    }

    fn put_chunk(&self, chunk: &[u8]) {
        assert!(chunk.len() <= 256);
        self.output.lock().unwrap().extend_from_slice(chunk);
    }
}

fn boot() -> (Kernel, Arc<Process>, Arc<TestConsole>) {
    let fs = Filesystem::format(Arc::new(MemDisk::new(2048)), 2048);
    let console = Arc::new(TestConsole::new());
    let kernel = Kernel {
        fs,
        console: console.clone(),
    };
    let process = Process::init(&kernel.fs, 1);
    (kernel, process, console)
}

#[test]
fn open_empty_path_fails() {
    let (kernel, process, _) = boot();
    assert_eq!(-1, sys_open(&kernel, &process, ""));
}

#[test]
fn open_root_directory() {
    let (kernel, process, _) = boot();

    let fd = sys_open(&kernel, &process, "/");
    assert!(fd >= 3);
    assert_eq!(1, sys_isdir(&process, fd as usize));
    assert_eq!(ROOT_SECTOR as isize, sys_inumber(&process, fd as usize));

    // 目录描述符拒绝文件操作
    assert_eq!(-1, sys_read(&kernel, &process, fd as usize, &mut [0; 4]));
    assert_eq!(-1, sys_write(&kernel, &process, fd as usize, &[0; 4]));
    assert_eq!(-1, sys_seek(&process, fd as usize, 0));
    assert_eq!(-1, sys_tell(&process, fd as usize));
    assert_eq!(-1, sys_filesize(&kernel, &process, fd as usize));

    assert_eq!(0, sys_close(&kernel, &process, fd as usize));
}

#[test]
fn seek_then_tell() {
    let (kernel, process, _) = boot();

    assert!(sys_create(&kernel, &process, "sample.txt", 239));
    let fd = sys_open(&kernel, &process, "sample.txt") as usize;
    sys_seek(&process, fd, 2);
    assert_eq!(2, sys_tell(&process, fd));
    assert_eq!(239, sys_filesize(&kernel, &process, fd));
}

#[test]
fn file_round_trip_via_descriptors() {
    let (kernel, process, _) = boot();

    assert!(sys_create(&kernel, &process, "notes", 0));
    let fd = sys_open(&kernel, &process, "notes") as usize;

    let data: Vec<u8> = (0..1500u32).map(|i| i as u8).collect();
    assert_eq!(1500, sys_write(&kernel, &process, fd, &data));

    sys_seek(&process, fd, 0);
    let mut read_back = vec![0; 1500];
    assert_eq!(1500, sys_read(&kernel, &process, fd, &mut read_back));
    assert_eq!(data, read_back);

    // 文件尾短读
    assert_eq!(0, sys_read(&kernel, &process, fd, &mut [0; 8]));

    // 同一 inode 的第二个描述符有独立游标，数据共享
    let other = sys_open(&kernel, &process, "notes") as usize;
    assert_ne!(fd, other);
    let mut head = [0u8; 4];
    assert_eq!(4, sys_read(&kernel, &process, other, &mut head));
    assert_eq!([0, 1, 2, 3], head);
}

#[test]
fn stdio_reservations() {
    let (kernel, process, console) = boot();

    // 写标准输出按 256 字节连续分片送出
    let message: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
    assert_eq!(600, sys_write(&kernel, &process, 1, &message));
    assert_eq!(message, console.taken());

    // 标准输入逐字符凑满请求
    console.feed(b"hi");
    let mut read_back = [0u8; 2];
    assert_eq!(2, sys_read(&kernel, &process, 0, &mut read_back));
    assert_eq!(b"hi", &read_back);

    // 错用保留描述符
    assert_eq!(-1, sys_read(&kernel, &process, 1, &mut [0; 1]));
    assert_eq!(-1, sys_read(&kernel, &process, 2, &mut [0; 1]));
    assert_eq!(-1, sys_write(&kernel, &process, 0, &[0]));
    assert_eq!(-1, sys_close(&kernel, &process, 0));
    assert_eq!(-1, sys_seek(&process, 1, 0));
    assert_eq!(-1, sys_filesize(&kernel, &process, 2));
    assert_eq!(-1, sys_inumber(&process, 0));

    // 越界描述符
    assert_eq!(-1, sys_read(&kernel, &process, MAX_OPEN, &mut [0; 1]));
    assert_eq!(-1, sys_close(&kernel, &process, MAX_OPEN));
}

#[test]
fn descriptor_table_fills_up() {
    let (kernel, process, _) = boot();

    assert!(sys_create(&kernel, &process, "f", 0));
    for _ in 3..MAX_OPEN {
        assert!(sys_open(&kernel, &process, "f") >= 3);
    }
    // 128 个槽位用尽
    assert_eq!(-1, sys_open(&kernel, &process, "f"));

    // 关一个就能再开一个
    assert_eq!(0, sys_close(&kernel, &process, 3));
    assert!(sys_open(&kernel, &process, "f") >= 3);
}

#[test]
fn mkdir_needs_existing_parent() {
    let (kernel, process, _) = boot();

    assert!(!sys_mkdir(&kernel, &process, "a/b"));
    assert!(sys_mkdir(&kernel, &process, "a"));
    assert!(sys_mkdir(&kernel, &process, "a/b"));
    assert!(!sys_mkdir(&kernel, &process, "a"));
}

#[test]
fn chdir_resolves_relative_paths() {
    let (kernel, process, _) = boot();

    assert!(sys_mkdir(&kernel, &process, "/x"));
    assert!(sys_chdir(&kernel, &process, "/x"));
    assert!(sys_mkdir(&kernel, &process, "y"));

    let fd = sys_open(&kernel, &process, "/x/y");
    assert!(fd >= 3);
    assert_eq!(1, sys_isdir(&process, fd as usize));

    // `..` 是普通目录项，一样参与解析
    assert!(sys_chdir(&kernel, &process, ".."));
    assert_eq!(Some(ROOT_SECTOR), process.cwd_sector());
}

#[test]
fn readdir_hides_dot_entries() {
    let (kernel, process, _) = boot();

    assert!(sys_mkdir(&kernel, &process, "d"));
    assert!(sys_create(&kernel, &process, "d/f", 0));

    let fd = sys_open(&kernel, &process, "d") as usize;
    assert_eq!(Some("f".to_string()), sys_readdir(&kernel, &process, fd));
    assert_eq!(None, sys_readdir(&kernel, &process, fd));

    // 文件描述符没有 readdir
    assert!(sys_create(&kernel, &process, "plain", 0));
    let plain = sys_open(&kernel, &process, "plain") as usize;
    assert_eq!(None, sys_readdir(&kernel, &process, plain));
}

#[test]
fn removal_policy() {
    let (kernel, process, _) = boot();

    // 根目录不可删
    assert!(!sys_remove(&kernel, &process, "/"));

    // 非空目录不可删
    assert!(sys_mkdir(&kernel, &process, "full"));
    assert!(sys_create(&kernel, &process, "full/f", 0));
    assert!(!sys_remove(&kernel, &process, "full"));

    // 当前工作目录不可删
    assert!(sys_mkdir(&kernel, &process, "here"));
    assert!(sys_chdir(&kernel, &process, "here"));
    assert!(!sys_remove(&kernel, &process, "/here"));
    assert!(sys_chdir(&kernel, &process, "/"));

    // 空目录可删
    assert!(sys_remove(&kernel, &process, "here"));
    assert_eq!(-1, sys_open(&kernel, &process, "here"));

    // 清空后目录可删
    assert!(sys_remove(&kernel, &process, "full/f"));
    assert!(sys_remove(&kernel, &process, "full"));
}

#[test]
fn removed_file_lives_until_close() {
    let (kernel, process, _) = boot();
    let baseline = kernel.fs.free_map().in_use();

    assert!(sys_create(&kernel, &process, "ghost", 0));
    let fd = sys_open(&kernel, &process, "ghost") as usize;
    assert_eq!(700, sys_write(&kernel, &process, fd, &[6; 700]));

    // 除名后旧描述符照常读写，新路径已不可达
    assert!(sys_remove(&kernel, &process, "ghost"));
    assert_eq!(-1, sys_open(&kernel, &process, "ghost"));
    sys_seek(&process, fd, 0);
    let mut read_back = [0u8; 700];
    assert_eq!(700, sys_read(&kernel, &process, fd, &mut read_back));
    assert_eq!([6; 700], read_back);

    // 关闭即释放全部空间
    assert_eq!(0, sys_close(&kernel, &process, fd));
    assert_eq!(baseline, kernel.fs.free_map().in_use());
}

#[test]
fn overlong_component_is_malformed() {
    let (kernel, process, _) = boot();

    let long_name = "n".repeat(27);
    assert!(!sys_create(&kernel, &process, &long_name, 0));
    assert_eq!(-1, sys_open(&kernel, &process, &format!("/{long_name}/x")));
}

#[test]
fn practice_adds_one() {
    assert_eq!(8, sys_practice(7));
}
