//! 缓存

mod project_cache;

pub use project_cache::ProjectRuleCache;
