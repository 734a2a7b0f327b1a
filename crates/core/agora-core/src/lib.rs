//! Agora Core - Shared types for the GPU spot market
//!
//! This crate defines the vocabulary used across the market engine and any
//! tooling built on top of it:
//! - Identifiers for clusters, teams, and workload shapes
//! - Static configuration types (cluster capacity, workload catalog)
//! - The demand-request type submitted by teams
//! - Error types

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
