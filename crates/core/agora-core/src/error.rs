//! Error types for Agora
//!
//! Only configuration mistakes are errors: a request referencing an unknown
//! shape, cluster, or team is rejected at submission and never reaches the
//! clearing cycle. Capacity, budget, and pricing shortfalls are expected
//! market outcomes recorded in the allocation plan, not errors.

use thiserror::Error;

use crate::types::{ClusterId, ShapeId, TeamId};

/// Agora result type
pub type Result<T> = std::result::Result<T, MarketError>;

/// Errors that can occur when configuring the market or submitting demand
#[derive(Error, Debug)]
pub enum MarketError {
    /// Request references a cluster not present in the configuration
    #[error("Unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    /// Request references a shape not present in the workload catalog
    #[error("Unknown workload shape: {0}")]
    UnknownShape(ShapeId),

    /// Request references a team not present in the registry
    #[error("Unknown team: {0}")]
    UnknownTeam(TeamId),

    /// Request quantity must be at least one unit
    #[error("Request quantity must be at least 1")]
    InvalidQuantity,

    /// Two clusters declared with the same id
    #[error("Duplicate cluster: {0}")]
    DuplicateCluster(ClusterId),

    /// Invalid static configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarketError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
