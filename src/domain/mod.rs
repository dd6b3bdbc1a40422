pub mod auth;
pub mod auth_session;
pub mod policy;
pub mod revocation;
pub mod user;
