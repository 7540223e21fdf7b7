pub mod auth;
pub mod client;
pub mod rate_limit;
pub mod response;

pub use auth::{Principal, PrincipalResolver};
pub use client::ClientInfo;
pub use rate_limit::{rate_limit, RateLimitScope};
pub use response::{ApiResponse, ApiResult};
