//! Request and response data structures for the HTTP API.

pub mod api_keys;
pub mod auth;
pub mod groups;
