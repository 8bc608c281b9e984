#![no_std]

mod error;
mod kind;

pub use self::{error::Error, kind::InodeKind};
