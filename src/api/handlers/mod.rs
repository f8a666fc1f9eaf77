//! API request handlers.

/// Health check handler.
pub mod health;
/// Research job handlers.
pub mod research;
