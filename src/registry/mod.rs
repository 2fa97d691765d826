//! Registry v2 HTTP client: Bearer auth retry loop, typed manifest GETs,
//! and streamed blob GETs.

pub mod auth;
pub mod client;

pub use auth::BearerChallenge;
pub use client::RegistryClient;
