//! Adapter implementations for the queue ports.
//!
//! - [`memory`]: in-process repository and operation registry
//! - [`postgres`]: Diesel-backed `PostgreSQL` task repository

pub mod memory;
pub mod postgres;
