use core::sync::atomic;
use core::sync::atomic::AtomicUsize;

/// 计数信号量。
/// 调度器是外部协作者，等待方以自旋让出处理器而非入队休眠。
pub struct Semaphore {
    permits: AtomicUsize,
}

impl Semaphore {
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: AtomicUsize::new(permits),
        }
    }

    /// Verhogen 增加
    pub fn up(&self) {
        self.permits.fetch_add(1, atomic::Ordering::Release);
    }

    /// Proberen 尝试：取不到资源立即返回
    pub fn try_down(&self) -> bool {
        let mut permits = self.permits.load(atomic::Ordering::Acquire);

        loop {
            if permits == 0 {
                return false;
            }

            match self.permits.compare_exchange(
                permits,
                permits - 1,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => permits = current,
            }
        }
    }

    /// 取得一个资源，直到成功为止
    pub fn down(&self) {
        while !self.try_down() {
            core::hint::spin_loop();
        }
    }
}
