/// Middleware for the API server
///
/// - `auth`: JWT authentication and the admin gate

pub mod auth;
