//! HTTP API handlers and routes
//!
//! # Endpoints
//!
//! - `GET /health` - liveness check
//! - `GET /sessions` / `POST /sessions` - list and create sessions
//! - `PATCH /sessions/{id}` / `DELETE /sessions/{id}` - rename and delete
//! - `GET /sessions/{id}/messages` - history, images inlined as base64
//! - `POST /sessions/{id}/title` - stream a generated title
//! - `POST /chat/stream` - submit a turn, reply streamed as `text/plain`
//! - `GET /me/tokens` - token usage of the caller
//! - `GET /api-docs/openapi.json` - OpenAPI document
//!
//! # Authentication
//!
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! Without the header, requests act as the configured default user when
//! anonymous access is enabled and are rejected with 401 otherwise.

/// Request handlers for all endpoints.
pub mod handlers;
/// Router configuration and the OpenAPI document.
pub mod routes;
