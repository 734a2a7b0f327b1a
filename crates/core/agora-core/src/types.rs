//! Core types shared across Agora components

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Unique identifier for a cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub String);

impl ClusterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a team
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a workload shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static spot-market configuration for one cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// All machines in the cluster, reserved and spot-eligible alike
    pub total_machines: u32,
    /// Machines set aside for guaranteed (whole-machine) reservations
    pub guaranteed_machines: u32,
    /// Base price per GPU for a guaranteed reservation
    pub base_guaranteed_price: f64,
    /// Base price per GPU on the spot market
    pub base_spot_price: f64,
    /// Exponent applied to guaranteed utilization
    pub sensitivity_guaranteed: f64,
    /// Exponent applied to the spot demand/supply ratio
    pub sensitivity_spot: f64,
    /// GPUs per machine
    pub machine_capacity_gpus: u32,
}

impl ClusterConfig {
    /// Machines eligible for spot allocation
    pub fn spot_machines(&self) -> u32 {
        self.total_machines.saturating_sub(self.guaranteed_machines)
    }

    /// Total GPUs available to the spot market
    pub fn spot_supply_gpus(&self) -> u32 {
        self.spot_machines() * self.machine_capacity_gpus
    }

    /// Check the structural invariants: at least one machine with nonzero
    /// capacity, guaranteed share within the fleet, nonnegative base prices.
    pub fn validate(&self, id: &ClusterId) -> Result<()> {
        if self.total_machines == 0 {
            return Err(MarketError::config(format!(
                "cluster {id}: total_machines must be at least 1"
            )));
        }
        if self.guaranteed_machines > self.total_machines {
            return Err(MarketError::config(format!(
                "cluster {id}: guaranteed_machines ({}) exceeds total_machines ({})",
                self.guaranteed_machines, self.total_machines
            )));
        }
        if self.machine_capacity_gpus == 0 {
            return Err(MarketError::config(format!(
                "cluster {id}: machine_capacity_gpus must be at least 1"
            )));
        }
        if self.base_guaranteed_price < 0.0 || self.base_spot_price < 0.0 {
            return Err(MarketError::config(format!(
                "cluster {id}: base prices must be nonnegative"
            )));
        }
        Ok(())
    }
}

/// A workload template fixing GPU count and a duration range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadShape {
    /// GPUs consumed by one unit of this shape
    pub gpus_per_unit: u32,
    /// Shortest duration a unit can run, in periods (inclusive)
    pub min_duration_periods: u64,
    /// Longest duration a unit can run, in periods (inclusive)
    pub max_duration_periods: u64,
}

impl WorkloadShape {
    pub fn validate(&self, id: &ShapeId) -> Result<()> {
        if self.gpus_per_unit == 0 {
            return Err(MarketError::config(format!(
                "shape {id}: gpus_per_unit must be at least 1"
            )));
        }
        if self.min_duration_periods == 0 {
            return Err(MarketError::config(format!(
                "shape {id}: min_duration_periods must be at least 1"
            )));
        }
        if self.min_duration_periods > self.max_duration_periods {
            return Err(MarketError::config(format!(
                "shape {id}: min_duration_periods ({}) exceeds max_duration_periods ({})",
                self.min_duration_periods, self.max_duration_periods
            )));
        }
        Ok(())
    }
}

/// One demand submission: `quantity` independent units of a workload shape.
///
/// Pinned requests carry a fixed target cluster; floating requests omit it
/// and are eligible for placement on any cluster. Requests are consumed by
/// the clearing cycle that processes them and never carry forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRequest {
    pub id: u64,
    pub team_id: TeamId,
    pub shape_id: ShapeId,
    pub quantity: u32,
    pub target_cluster: Option<ClusterId>,
}

impl DemandRequest {
    pub fn is_pinned(&self) -> bool {
        self.target_cluster.is_some()
    }
}
