//! Credentials, access tokens, and the token manager that keeps one fresh token per client.

pub mod manager;
pub mod secret;
pub mod token;

pub use manager::*;
pub use secret::*;
pub use token::*;
