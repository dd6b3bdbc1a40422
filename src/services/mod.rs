pub mod auth_service;
pub mod credential_service;
pub mod health_service;
pub mod revocation_service;
pub mod token_service;
pub mod user_service;
