/// 文件系统项的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum InodeKind {
    #[default]
    File = 1,
    Directory = 2,
}
