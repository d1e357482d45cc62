//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `GET /healthz`: liveness, no authentication
//! - `/api/auth/identity`: the caller's identity and scopes
//! - `/api/apikey/*`: API key management (`apiKey.read` / `apiKey.write`)
//! - `/api/groups/*`: group management (`group.read` / `group.write`)

pub mod handlers;
pub mod models;
