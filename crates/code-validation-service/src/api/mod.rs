//! HTTP 接口
//!
//! 认证（API Key + HMAC 签名）和限流由上游网关完成，这里只暴露校验与查询。

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
