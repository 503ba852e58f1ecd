//! CodeGuard 共享库
//!
//! 包含服务共用的配置加载、错误类型、数据库连接、缓存与可观测性基础设施。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
