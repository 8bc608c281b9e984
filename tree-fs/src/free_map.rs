//! # 空闲扇区图契约
//!
//! 空闲图是进程级共享的协作者：申请与退还都应尽可能短地持有其内部锁。

/// 空闲扇区图特质，本仓库所有调用方都只以 `n == 1` 调用
pub trait FreeMap: Send + Sync {
    /// 申请 `n` 个连续扇区，返回首扇区；空间耗尽则返回空
    fn allocate(&self, n: u32) -> Option<u32>;

    /// 退还从 `sector` 起的 `n` 个扇区
    fn release(&self, sector: u32, n: u32);

    /// 已分配扇区数
    fn in_use(&self) -> usize;
}
