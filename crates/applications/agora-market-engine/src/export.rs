//! Structured per-cycle export
//!
//! A [`CycleSnapshot`] reshapes one clearing outcome by cluster, ready for
//! serialization to whatever interchange format the caller picks. Floating
//! demand that went unsatisfied has no target cluster, so those entries sit
//! at the top level rather than under any cluster.

use std::collections::BTreeMap;

use agora_core::ClusterId;
use serde::{Deserialize, Serialize};

use crate::types::{ClearingResult, SatisfiedUnit, UnsatisfiedRequest};

/// Prices and allocation outcomes for one cluster in one period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub guaranteed_price: f64,
    /// None when the cluster has no spot supply
    pub spot_price: Option<f64>,
    pub satisfied_pinned: Vec<SatisfiedUnit>,
    pub satisfied_floating: Vec<SatisfiedUnit>,
    pub unsatisfied_pinned: Vec<UnsatisfiedRequest>,
}

/// The exportable outcome of one clearing period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub period: u64,
    pub clusters: BTreeMap<ClusterId, ClusterSnapshot>,
    pub unsatisfied_floating: Vec<UnsatisfiedRequest>,
}

impl CycleSnapshot {
    pub fn from_result(result: &ClearingResult) -> Self {
        let satisfied_in = |units: &[SatisfiedUnit], cluster_id: &ClusterId| {
            units
                .iter()
                .filter(|unit| &unit.cluster_id == cluster_id)
                .cloned()
                .collect::<Vec<_>>()
        };

        let clusters = result
            .price_list
            .guaranteed
            .iter()
            .map(|(cluster_id, guaranteed_price)| {
                let spot = result
                    .price_list
                    .spot
                    .get(cluster_id)
                    .copied()
                    .unwrap_or(f64::INFINITY);
                let unsatisfied_pinned = result
                    .plan
                    .unsatisfied
                    .pinned
                    .iter()
                    .filter(|entry| entry.request.target_cluster.as_ref() == Some(cluster_id))
                    .cloned()
                    .collect();

                let snapshot = ClusterSnapshot {
                    guaranteed_price: *guaranteed_price,
                    spot_price: spot.is_finite().then_some(spot),
                    satisfied_pinned: satisfied_in(&result.plan.satisfied.pinned, cluster_id),
                    satisfied_floating: satisfied_in(&result.plan.satisfied.floating, cluster_id),
                    unsatisfied_pinned,
                };
                (cluster_id.clone(), snapshot)
            })
            .collect();

        CycleSnapshot {
            period: result.period,
            clusters,
            unsatisfied_floating: result.plan.unsatisfied.floating.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllocationPlan, PriceList};
    use agora_core::{DemandRequest, ShapeId, TeamId};

    fn unit(cluster: &str, request_id: u64) -> SatisfiedUnit {
        SatisfiedUnit {
            request_id,
            team_id: TeamId::new("t1"),
            shape_id: ShapeId::new("small"),
            cluster_id: ClusterId::new(cluster),
            gpus_used: 2,
            duration: 1,
            cost: 1.0,
        }
    }

    fn result() -> ClearingResult {
        let mut price_list = PriceList::default();
        price_list.guaranteed.insert(ClusterId::new("c1"), 9.0);
        price_list.guaranteed.insert(ClusterId::new("c2"), 10.0);
        price_list.spot.insert(ClusterId::new("c1"), 0.5);
        price_list.spot.insert(ClusterId::new("c2"), f64::INFINITY);

        let mut plan = AllocationPlan::default();
        plan.satisfied.pinned.push(unit("c1", 1));
        plan.satisfied.floating.push(unit("c1", 2));
        plan.unsatisfied.pinned.push(UnsatisfiedRequest {
            request: DemandRequest {
                id: 3,
                team_id: TeamId::new("t1"),
                shape_id: ShapeId::new("small"),
                quantity: 2,
                target_cluster: Some(ClusterId::new("c2")),
            },
            unsatisfied_quantity: 2,
        });
        plan.unsatisfied.floating.push(UnsatisfiedRequest {
            request: DemandRequest {
                id: 4,
                team_id: TeamId::new("t1"),
                shape_id: ShapeId::new("small"),
                quantity: 1,
                target_cluster: None,
            },
            unsatisfied_quantity: 1,
        });

        ClearingResult {
            period: 5,
            price_list,
            plan,
            jobs_released: 0,
        }
    }

    #[test]
    fn test_snapshot_partitions_by_cluster() {
        let snapshot = CycleSnapshot::from_result(&result());

        let c1 = &snapshot.clusters[&ClusterId::new("c1")];
        assert_eq!(c1.satisfied_pinned.len(), 1);
        assert_eq!(c1.satisfied_floating.len(), 1);
        assert!(c1.unsatisfied_pinned.is_empty());
        assert_eq!(c1.spot_price, Some(0.5));

        let c2 = &snapshot.clusters[&ClusterId::new("c2")];
        assert!(c2.satisfied_pinned.is_empty());
        assert_eq!(c2.unsatisfied_pinned.len(), 1);
        assert_eq!(c2.spot_price, None);

        assert_eq!(snapshot.unsatisfied_floating.len(), 1);
        assert_eq!(snapshot.period, 5);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = CycleSnapshot::from_result(&result());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"period\":5"));
        assert!(json.contains("\"spot_price\":null"));
    }
}
