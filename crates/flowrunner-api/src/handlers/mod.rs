pub mod accounts;
pub mod auth;
pub mod executions;
pub mod flows;
pub mod health;
pub mod plugins;
pub mod secrets;
