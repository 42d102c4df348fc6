//! Provider integration: wire schema and HTTP client for the telephony API.

pub mod client;
pub mod types;
