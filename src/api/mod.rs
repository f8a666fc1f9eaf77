//! HTTP API Handlers and Routes
//!
//! A thin REST layer over the [`Orchestrator`](crate::research::Orchestrator),
//! built on the Axum web framework.
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research` - Submit a job (202 + job id)
//! - `GET /api/research` - List jobs, most recent first
//! - `GET /api/research/{id}` - Job snapshot with partial results
//! - `GET /api/research/{id}/sources` - Sources table
//! - `DELETE /api/research/{id}` - Delete a finished job
//! - `GET /api/research/events` - Server-sent job events
//!
//! ## Other
//! - `GET /health` - Health check
//! - `GET /api/openapi.json` - OpenAPI document
//!
//! Errors are returned as `{"error": "...", "kind": "..."}` with a status
//! code derived from [`AppError`](crate::types::AppError).

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
