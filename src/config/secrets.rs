//! Secret handling utilities.
//!
//! Re-exports secrecy types used for the database URL and the push
//! transport's access token.

pub use secrecy::{ExposeSecret, SecretString};
