/// Router Module Index
///
/// Routes are split by access level, and each level is guarded by its own layer in
/// `create_router`, so a handler cannot end up in the wrong tier by accident.

/// Routes open to anonymous clients: sign-up, sign-in, health, API document.
pub mod public;

/// Routes that need any valid bearer token.
pub mod authenticated;

/// Routes that need a valid bearer token with the admin role.
pub mod admin;
