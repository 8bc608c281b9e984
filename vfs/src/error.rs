#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    IsADirectory,
    NotADirectory,
    DirectoryNotEmpty,
    /// 路径分量超过 `NAME_MAX`
    NameTooLong,
    /// 空闲扇区耗尽
    NoSpace,
}
