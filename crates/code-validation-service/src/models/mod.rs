//! 数据模型

mod enums;
mod ledger;
mod project;
mod rule;
mod structure;

pub use enums::*;
pub use ledger::*;
pub use project::*;
pub use rule::*;
pub use structure::*;
