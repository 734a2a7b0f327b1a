//! Synthetic demand generation for the simulation harness
//!
//! Stands in for interactive demand entry: a seeded generator produces a
//! plausible per-period mix of pinned and floating requests, with Poisson
//! arrivals and uniform team/shape/cluster picks.

use agora_core::{ClusterId, ShapeId, TeamId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

/// One generated request, ready for submission
#[derive(Debug, Clone)]
pub struct GeneratedRequest {
    pub team_id: TeamId,
    pub shape_id: ShapeId,
    pub quantity: u32,
    /// Some for pinned requests, None for floating
    pub target_cluster: Option<ClusterId>,
}

/// Seeded generator of per-period demand
pub struct DemandGenerator {
    rng: StdRng,
    teams: Vec<TeamId>,
    shapes: Vec<ShapeId>,
    clusters: Vec<ClusterId>,
    requests_per_period: f64,
    pinned_ratio: f64,
    max_quantity: u32,
}

impl DemandGenerator {
    /// Create a generator drawing from the given team/shape/cluster pools
    ///
    /// # Arguments
    /// * `requests_per_period` - Mean arrivals per period (Poisson)
    /// * `pinned_ratio` - Probability that a request pins a random cluster
    pub fn new(
        seed: u64,
        teams: Vec<TeamId>,
        shapes: Vec<ShapeId>,
        clusters: Vec<ClusterId>,
        requests_per_period: f64,
        pinned_ratio: f64,
    ) -> Self {
        DemandGenerator {
            rng: StdRng::seed_from_u64(seed),
            teams,
            shapes,
            clusters,
            requests_per_period: requests_per_period.max(0.1),
            pinned_ratio: pinned_ratio.clamp(0.0, 1.0),
            max_quantity: 4,
        }
    }

    /// Generate one period's worth of requests
    pub fn generate(&mut self) -> Vec<GeneratedRequest> {
        if self.teams.is_empty() || self.shapes.is_empty() {
            return Vec::new();
        }

        let arrivals = Poisson::new(self.requests_per_period).unwrap();
        let count = arrivals.sample(&mut self.rng) as usize;

        (0..count)
            .map(|_| {
                let team_id = self.teams[self.rng.gen_range(0..self.teams.len())].clone();
                let shape_id = self.shapes[self.rng.gen_range(0..self.shapes.len())].clone();
                let quantity = self.rng.gen_range(1..=self.max_quantity);

                let target_cluster = if !self.clusters.is_empty()
                    && self.rng.gen_bool(self.pinned_ratio)
                {
                    Some(self.clusters[self.rng.gen_range(0..self.clusters.len())].clone())
                } else {
                    None
                };

                GeneratedRequest {
                    team_id,
                    shape_id,
                    quantity,
                    target_cluster,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: u64, pinned_ratio: f64) -> DemandGenerator {
        DemandGenerator::new(
            seed,
            vec![TeamId::new("t1"), TeamId::new("t2")],
            vec![ShapeId::new("inference"), ShapeId::new("batch")],
            vec![ClusterId::new("c1")],
            5.0,
            pinned_ratio,
        )
    }

    #[test]
    fn test_same_seed_same_demand() {
        let mut a = generator(3, 0.5);
        let mut b = generator(3, 0.5);

        for _ in 0..10 {
            let left = a.generate();
            let right = b.generate();
            assert_eq!(left.len(), right.len());
            for (l, r) in left.iter().zip(right.iter()) {
                assert_eq!(l.team_id, r.team_id);
                assert_eq!(l.shape_id, r.shape_id);
                assert_eq!(l.quantity, r.quantity);
                assert_eq!(l.target_cluster, r.target_cluster);
            }
        }
    }

    #[test]
    fn test_quantities_are_positive_and_bounded() {
        let mut generator = generator(7, 0.3);
        for _ in 0..50 {
            for request in generator.generate() {
                assert!((1..=4).contains(&request.quantity));
            }
        }
    }

    #[test]
    fn test_pinned_ratio_extremes() {
        let mut all_floating = generator(1, 0.0);
        for _ in 0..20 {
            assert!(all_floating
                .generate()
                .iter()
                .all(|r| r.target_cluster.is_none()));
        }

        let mut all_pinned = generator(1, 1.0);
        for _ in 0..20 {
            assert!(all_pinned
                .generate()
                .iter()
                .all(|r| r.target_cluster.is_some()));
        }
    }

    #[test]
    fn test_empty_pools_generate_nothing() {
        let mut generator = DemandGenerator::new(1, Vec::new(), Vec::new(), Vec::new(), 5.0, 0.5);
        assert!(generator.generate().is_empty());
    }
}
