//! 数据库仓储层
//!
//! 校验管线只依赖 `traits` 中的接口：项目与规则只读，台账读写。
//! 生产使用 PostgreSQL 实现，测试与本地运行使用内存实现。

mod ledger_repo;
mod memory;
mod project_repo;
mod traits;

pub use ledger_repo::LedgerRepository;
pub use memory::InMemoryStore;
pub use project_repo::ProjectRepository;
pub use traits::*;
