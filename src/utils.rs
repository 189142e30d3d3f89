pub mod common;
pub mod global;
