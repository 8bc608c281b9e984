//! 终端后端接口，由嵌入方注入

pub trait Console: Send + Sync {
    /// 阻塞读取一个输入字符
    fn getchar(&self) -> u8;

    /// 向终端送出一段连续字节
    fn put_chunk(&self, chunk: &[u8]);
}
