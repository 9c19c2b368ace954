/// Authentication helpers used by the HTTP layer
///
/// # Modules
///
/// - `password`: Argon2id password hashing and verification
/// - `jwt`: HS256 access and refresh tokens carrying user id, username and role

pub mod jwt;
pub mod password;
