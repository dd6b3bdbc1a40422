pub mod auth;
pub mod envelope;
pub mod health;
pub mod users;

pub use envelope::ApiResponse;
