//! Persisted task queue.
//!
//! Callers enqueue tasks naming an operation and its arguments; an
//! externally triggered scheduler pass selects eligible tasks, claims them
//! atomically, runs them and records their outcome. A cleanup sweep removes
//! halted tasks. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - File-based settings in [`config`]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
