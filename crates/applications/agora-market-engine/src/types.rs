//! Core types for the market engine

use std::collections::BTreeMap;

use agora_core::{ClusterId, DemandRequest, ShapeId, TeamId};
use serde::{Deserialize, Serialize};

/// An allocated unit of work
///
/// A job lives on the machine it was placed on from `start_period` until the
/// first cycle where `current_period >= completion_period`, at which point
/// release moves it into the engine-owned completed history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub shape_id: ShapeId,
    pub gpus_used: u32,
    pub team_id: TeamId,
    pub start_period: u64,
    pub duration: u64,
    pub completion_period: u64,
    pub cost: f64,
}

impl Job {
    /// True while the job still occupies its machine at the given period
    pub fn is_active(&self, current_period: u64) -> bool {
        self.completion_period > current_period
    }
}

/// Why a unit of demand went unsatisfied
///
/// These are expected market outcomes, not engine failures; the cycle records
/// them and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationFailure {
    /// No single machine in any eligible cluster fits the shape
    CapacityUnavailable,
    /// The team cannot afford the marginal cost on any eligible cluster
    BudgetExceeded,
    /// Zero spot supply in every eligible cluster
    PricingUnavailable,
}

/// One satisfied unit of demand, with its own placement, duration, and cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatisfiedUnit {
    pub request_id: u64,
    pub team_id: TeamId,
    pub shape_id: ShapeId,
    pub cluster_id: ClusterId,
    pub gpus_used: u32,
    pub duration: u64,
    pub cost: f64,
}

/// A request that could not be fully satisfied this period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsatisfiedRequest {
    pub request: DemandRequest,
    pub unsatisfied_quantity: u32,
}

/// Satisfied demand split by placement kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SatisfiedDemand {
    pub pinned: Vec<SatisfiedUnit>,
    pub floating: Vec<SatisfiedUnit>,
}

/// Unsatisfied demand split by placement kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnsatisfiedDemand {
    pub pinned: Vec<UnsatisfiedRequest>,
    pub floating: Vec<UnsatisfiedRequest>,
}

/// The allocation outcome of one clearing period
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub satisfied: SatisfiedDemand,
    pub unsatisfied: UnsatisfiedDemand,
}

impl AllocationPlan {
    /// Units placed this period
    pub fn satisfied_units(&self) -> usize {
        self.satisfied.pinned.len() + self.satisfied.floating.len()
    }

    /// Units that found no affordable, fitting machine this period
    pub fn unsatisfied_units(&self) -> u32 {
        self.unsatisfied
            .pinned
            .iter()
            .chain(self.unsatisfied.floating.iter())
            .map(|entry| entry.unsatisfied_quantity)
            .sum()
    }
}

/// Prices recorded for the period just cleared
///
/// Spot prices use `f64::INFINITY` as the unavailable sentinel: a cluster
/// with no spot supply can never clear an allocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceList {
    /// Cost of reserving a whole machine, per cluster
    pub guaranteed: BTreeMap<ClusterId, f64>,
    /// Cost per GPU for the period just cleared, per cluster
    pub spot: BTreeMap<ClusterId, f64>,
}

/// Outcome of one clearing period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingResult {
    pub period: u64,
    pub price_list: PriceList,
    pub plan: AllocationPlan,
    /// Jobs that completed and were released at the start of this cycle
    pub jobs_released: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_activity_window() {
        let job = Job {
            shape_id: ShapeId::new("inference"),
            gpus_used: 1,
            team_id: TeamId::new("t1"),
            start_period: 3,
            duration: 2,
            completion_period: 5,
            cost: 1.0,
        };

        assert!(job.is_active(3));
        assert!(job.is_active(4));
        assert!(!job.is_active(5));
        assert!(!job.is_active(6));
    }

    #[test]
    fn test_plan_unit_counts() {
        let request = DemandRequest {
            id: 1,
            team_id: TeamId::new("t1"),
            shape_id: ShapeId::new("inference"),
            quantity: 3,
            target_cluster: None,
        };

        let mut plan = AllocationPlan::default();
        plan.satisfied.floating.push(SatisfiedUnit {
            request_id: 1,
            team_id: request.team_id.clone(),
            shape_id: request.shape_id.clone(),
            cluster_id: ClusterId::new("c1"),
            gpus_used: 1,
            duration: 1,
            cost: 0.5,
        });
        plan.unsatisfied.floating.push(UnsatisfiedRequest {
            request,
            unsatisfied_quantity: 2,
        });

        assert_eq!(plan.satisfied_units(), 1);
        assert_eq!(plan.unsatisfied_units(), 2);
    }
}
