//! # 路径解析层
//!
//! 把以 `/` 分隔的文本路径翻译成目录与 inode 句柄。
//! 以 `/` 开头的路径从根目录出发，否则从调用方的当前工作目录出发
//! （没有 cwd 时同样从根出发）。
//!
//! 所有失败形态（分量超长、中间项缺失、中间项不是目录）都折叠成
//! "无结果"，由调用方翻译成面向用户的错误。

use alloc::sync::Arc;

use crate::Dir;
use crate::Filesystem;
use crate::Inode;
use crate::NAME_MAX;

/// [`next_part`] 的产出
#[derive(Debug, PartialEq, Eq)]
pub enum NextPart<'a> {
    /// 下一个路径分量
    Part(&'a str),
    /// 路径已耗尽（空串或只剩斜杠）
    Done,
    /// 分量超过 [`NAME_MAX`]
    TooLong,
}

/// 从 `cursor` 提取下一个路径分量并推进游标。
/// 纯函数，方便单独驱动测试。
pub fn next_part<'a>(cursor: &mut &'a str) -> NextPart<'a> {
    let src = cursor.trim_start_matches('/');
    if src.is_empty() {
        *cursor = src;
        return NextPart::Done;
    }

    let end = src.find('/').unwrap_or(src.len());
    if end > NAME_MAX {
        return NextPart::TooLong;
    }

    let (part, rest) = src.split_at(end);
    *cursor = rest;
    NextPart::Part(part)
}

/// 路径的最后一个分量。路径全为斜杠时为空串；
/// 任何分量超长时视作畸形路径，返回空。
pub fn basename(path: &str) -> Option<&str> {
    let mut cursor = path;
    let mut last = "";

    loop {
        match next_part(&mut cursor) {
            NextPart::Part(part) => last = part,
            NextPart::Done => return Some(last),
            NextPart::TooLong => return None,
        }
    }
}

/// 解析出"将要包含 basename 的那个目录"：走完除最后一个分量外的全部路径。
/// 任何中间项缺失或不是目录都返回空。
pub fn dir_of(fs: &Filesystem, cwd: Option<&Dir>, path: &str) -> Option<Dir> {
    let mut dir = match cwd {
        Some(cwd) if !path.starts_with('/') => cwd.reopen(),
        _ => fs.root_dir(),
    };

    let mut cursor = path;
    loop {
        let part = match next_part(&mut cursor) {
            NextPart::Part(part) => part,
            NextPart::Done => return Some(dir),
            NextPart::TooLong => {
                dir.close(fs);
                return None;
            }
        };

        if cursor.trim_start_matches('/').is_empty() {
            // part 就是 basename，不再下降
            return Some(dir);
        }

        let Some(inode) = dir.lookup(fs, part) else {
            dir.close(fs);
            return None;
        };
        let Ok(next) = Dir::open(fs, inode) else {
            dir.close(fs);
            return None;
        };
        dir.close(fs);
        dir = next;
    }
}

/// 解析路径指向的 inode。basename 为空（如 `/`）时，
/// 返回目录自身的 inode。
pub fn inode_of(fs: &Filesystem, cwd: Option<&Dir>, path: &str) -> Option<Arc<Inode>> {
    let name = basename(path)?;
    let dir = dir_of(fs, cwd, path)?;

    let inode = if name.is_empty() {
        let inode = dir.inode().clone();
        inode.reopen();
        Some(inode)
    } else {
        dir.lookup(fs, name)
    };

    dir.close(fs);
    inode
}
