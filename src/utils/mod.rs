//! Configuration utilities.

/// Construction of stores, agents and the orchestrator from configuration.
pub mod bootstrap;
/// TOML configuration (`juris.toml`).
pub mod toml_config;
