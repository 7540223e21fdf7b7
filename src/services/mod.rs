pub mod audit;
pub mod payment;
pub mod rate_limiter;
pub mod spreadsheet;

pub use audit::AuditLogger;
pub use payment::{HttpPaymentGateway, PaymentGateway};
pub use rate_limiter::{spawn_sweeper, FixedWindowLimiter, RateLimiter};
