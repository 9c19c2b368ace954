/// API route handlers
///
/// Every mutating handler writes its entity change and the matching audit entry
/// in one transaction, so either both are stored or neither is.

pub mod audit;
pub mod auth;
pub mod health;
pub mod projects;
pub mod recycle_bin;
pub mod tasks;
pub mod users;
