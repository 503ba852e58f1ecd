//! 请求处理器

pub mod cache;
pub mod codes;
pub mod health;
pub mod stats;
pub mod validate;
