//! Account service: password hashing, opaque bearer tokens, and rate
//! limiting for FlowRunner accounts. Sits between `flowrunner-storage`
//! (persistence) and the HTTP layer (`flowrunner-api`), which should call
//! into `AccountService` rather than `StorageProvider` directly for
//! anything account-related.

pub mod config;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod service;

pub use config::{AccountConfig, PasswordConfig, RateLimitConfig};
pub use error::{AccountError, AccountResult, ErrorResponse};
pub use password::{PasswordService, PasswordStrength};
pub use rate_limit::RateLimiter;
pub use service::AccountService;
