//! The market clearing engine
//!
//! One [`MarketEngine`] value owns every piece of simulation state: the
//! period counter, machine capacity, team ledger, demand queue, and the
//! completed-job history. Callers submit demand between cycles and drive the
//! market with [`MarketEngine::run_clearing_period`]; each call clears
//! exactly one discrete period.
//!
//! The inner allocation loop is inherently sequential: every unit's price
//! depends on the usage left behind by earlier units, and every budget check
//! depends on earlier charges in the same cycle. Allocation effects apply to
//! a working copy of capacity and ledger that commits back only when the
//! cycle completes.

use std::collections::{HashMap, HashSet};

use agora_core::{
    ClusterConfig, ClusterId, DemandRequest, MarketError, Result, ShapeId, TeamId, WorkloadShape,
};
use tracing::{debug, info};

use crate::capacity::CapacityModel;
use crate::demand::DemandQueue;
use crate::ledger::TeamLedger;
use crate::pricing;
use crate::sampler::DurationSampler;
use crate::types::{
    AllocationFailure, AllocationPlan, ClearingResult, Job, PriceList, SatisfiedUnit,
    UnsatisfiedRequest,
};

/// Working state for one clearing cycle
struct WorkingState {
    capacity: CapacityModel,
    ledger: TeamLedger,
    usage: HashMap<ClusterId, u32>,
}

/// The clearing and allocation engine for one simulated market
pub struct MarketEngine {
    /// Declaration order is load-bearing: it breaks price ties for floating
    /// demand and fixes the candidate scan order.
    clusters: Vec<(ClusterId, ClusterConfig)>,
    shapes: HashMap<ShapeId, WorkloadShape>,
    capacity: CapacityModel,
    ledger: TeamLedger,
    queue: DemandQueue,
    completed_jobs: Vec<Job>,
    period: u64,
    next_request_id: u64,
    sampler: Box<dyn DurationSampler>,
}

impl std::fmt::Debug for MarketEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketEngine")
            .field("clusters", &self.clusters)
            .field("shapes", &self.shapes)
            .field("capacity", &self.capacity)
            .field("ledger", &self.ledger)
            .field("queue", &self.queue)
            .field("completed_jobs", &self.completed_jobs)
            .field("period", &self.period)
            .field("next_request_id", &self.next_request_id)
            .field("sampler", &"<dyn DurationSampler>")
            .finish()
    }
}

impl MarketEngine {
    /// Build an engine from already-validated structured configuration.
    /// Clusters and machines are created once here and persist for the
    /// engine's lifetime.
    pub fn new(
        clusters: Vec<(ClusterId, ClusterConfig)>,
        shapes: HashMap<ShapeId, WorkloadShape>,
        teams: Vec<(TeamId, f64)>,
        sampler: Box<dyn DurationSampler>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for (id, config) in &clusters {
            if !seen.insert(id.clone()) {
                return Err(MarketError::DuplicateCluster(id.clone()));
            }
            config.validate(id)?;
        }
        for (id, shape) in &shapes {
            shape.validate(id)?;
        }
        for (id, budget) in &teams {
            if !budget.is_finite() || *budget < 0.0 {
                return Err(MarketError::config(format!(
                    "team {id}: initial budget must be a finite nonnegative number"
                )));
            }
        }

        let capacity = CapacityModel::new(&clusters);
        let ledger = TeamLedger::new(teams);

        Ok(MarketEngine {
            clusters,
            shapes,
            capacity,
            ledger,
            queue: DemandQueue::new(),
            completed_jobs: Vec::new(),
            period: 0,
            next_request_id: 0,
            sampler,
        })
    }

    /// Queue a request bound to one specific cluster
    pub fn submit_pinned(
        &mut self,
        team_id: TeamId,
        shape_id: ShapeId,
        quantity: u32,
        target_cluster: ClusterId,
    ) -> Result<u64> {
        self.validate_submission(&team_id, &shape_id, quantity)?;
        if self.cluster_config(&target_cluster).is_none() {
            return Err(MarketError::UnknownCluster(target_cluster));
        }

        let id = self.next_request_id();
        self.queue.push_pinned(DemandRequest {
            id,
            team_id,
            shape_id,
            quantity,
            target_cluster: Some(target_cluster),
        });
        Ok(id)
    }

    /// Queue a request eligible for placement on any cluster
    pub fn submit_floating(
        &mut self,
        team_id: TeamId,
        shape_id: ShapeId,
        quantity: u32,
    ) -> Result<u64> {
        self.validate_submission(&team_id, &shape_id, quantity)?;

        let id = self.next_request_id();
        self.queue.push_floating(DemandRequest {
            id,
            team_id,
            shape_id,
            quantity,
            target_cluster: None,
        });
        Ok(id)
    }

    fn validate_submission(&self, team_id: &TeamId, shape_id: &ShapeId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if !self.ledger.contains(team_id) {
            return Err(MarketError::UnknownTeam(team_id.clone()));
        }
        if !self.shapes.contains_key(shape_id) {
            return Err(MarketError::UnknownShape(shape_id.clone()));
        }
        Ok(())
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Clear one period.
    ///
    /// Releases finished jobs, records guaranteed prices, walks pinned then
    /// floating demand unit-by-unit against marginal spot prices, records
    /// final spot prices from post-allocation usage, and drops the demand
    /// queue. Capacity and ledger effects commit atomically at the end.
    pub fn run_clearing_period(&mut self) -> ClearingResult {
        self.period += 1;

        let released = self.capacity.release(self.period);
        let jobs_released = released.len();
        self.completed_jobs.extend(released);

        let mut work = WorkingState {
            capacity: self.capacity.clone(),
            ledger: self.ledger.clone(),
            usage: self.capacity.gpu_usage(),
        };

        let mut price_list = PriceList::default();
        for (cluster_id, config) in &self.clusters {
            price_list
                .guaranteed
                .insert(cluster_id.clone(), pricing::guaranteed_price(config));
        }

        let (pinned, floating) = self.queue.drain();
        let mut plan = AllocationPlan::default();

        for request in &pinned {
            let mut satisfied = 0;
            for _ in 0..request.quantity {
                match self.process_unit(request, &mut work) {
                    Ok(unit) => {
                        plan.satisfied.pinned.push(unit);
                        satisfied += 1;
                    }
                    Err(reason) => {
                        debug!(request = request.id, team = %request.team_id, ?reason, "pinned unit unsatisfied");
                    }
                }
            }
            if satisfied < request.quantity {
                plan.unsatisfied.pinned.push(UnsatisfiedRequest {
                    request: request.clone(),
                    unsatisfied_quantity: request.quantity - satisfied,
                });
            }
        }

        for request in &floating {
            let mut satisfied = 0;
            for _ in 0..request.quantity {
                match self.process_unit(request, &mut work) {
                    Ok(unit) => {
                        plan.satisfied.floating.push(unit);
                        satisfied += 1;
                    }
                    Err(reason) => {
                        debug!(request = request.id, team = %request.team_id, ?reason, "floating unit unsatisfied");
                    }
                }
            }
            if satisfied < request.quantity {
                plan.unsatisfied.floating.push(UnsatisfiedRequest {
                    request: request.clone(),
                    unsatisfied_quantity: request.quantity - satisfied,
                });
            }
        }

        for (cluster_id, config) in &self.clusters {
            let usage = work.usage.get(cluster_id).copied().unwrap_or(0);
            price_list
                .spot
                .insert(cluster_id.clone(), pricing::spot_price_per_gpu(config, usage));
        }

        self.capacity = work.capacity;
        self.ledger = work.ledger;

        info!(
            period = self.period,
            released = jobs_released,
            satisfied = plan.satisfied_units(),
            unsatisfied = plan.unsatisfied_units(),
            "market cleared"
        );

        ClearingResult {
            period: self.period,
            price_list,
            plan,
            jobs_released,
        }
    }

    /// Attempt one unit of a request: sample its duration, find the cheapest
    /// feasible cluster (the pinned target only, or every cluster for
    /// floating demand), then allocate, charge, and advance the usage
    /// baseline for the units that follow.
    fn process_unit(
        &mut self,
        request: &DemandRequest,
        work: &mut WorkingState,
    ) -> std::result::Result<SatisfiedUnit, AllocationFailure> {
        let shape = &self.shapes[&request.shape_id];
        let gpus = shape.gpus_per_unit;
        let duration = self.sampler.sample_duration(shape);
        let budget = work.ledger.remaining_budget(&request.team_id);

        let mut best: Option<(&ClusterId, f64)> = None;
        let mut saw_unpriced = false;
        let mut saw_unaffordable = false;

        for (cluster_id, config) in &self.clusters {
            if let Some(target) = &request.target_cluster {
                if cluster_id != target {
                    continue;
                }
            }
            if !work.capacity.can_fit(cluster_id, gpus) {
                continue;
            }

            let marginal_usage = work.usage.get(cluster_id).copied().unwrap_or(0) + gpus;
            let price_per_gpu = pricing::spot_price_per_gpu(config, marginal_usage);
            let cost = price_per_gpu * gpus as f64 * duration as f64;

            if !cost.is_finite() {
                saw_unpriced = true;
                continue;
            }
            if cost > budget {
                saw_unaffordable = true;
                continue;
            }

            // Strict comparison: ties go to the earliest-declared cluster.
            match best {
                Some((_, best_cost)) if best_cost <= cost => {}
                _ => best = Some((cluster_id, cost)),
            }
        }

        let Some((cluster_id, cost)) = best else {
            return Err(if saw_unaffordable {
                AllocationFailure::BudgetExceeded
            } else if saw_unpriced {
                AllocationFailure::PricingUnavailable
            } else {
                AllocationFailure::CapacityUnavailable
            });
        };
        let cluster_id = cluster_id.clone();

        let job = Job {
            shape_id: request.shape_id.clone(),
            gpus_used: gpus,
            team_id: request.team_id.clone(),
            start_period: self.period,
            duration,
            completion_period: self.period + duration,
            cost,
        };

        // Both must succeed: fit and affordability were just checked against
        // this same working state.
        let placed = work.capacity.allocate(&cluster_id, job);
        debug_assert!(placed);
        let charged = work.ledger.charge(&request.team_id, cost);
        debug_assert!(charged);
        *work.usage.entry(cluster_id.clone()).or_insert(0) += gpus;

        Ok(SatisfiedUnit {
            request_id: request.id,
            team_id: request.team_id.clone(),
            shape_id: request.shape_id.clone(),
            cluster_id,
            gpus_used: gpus,
            duration,
            cost,
        })
    }

    /// Periods cleared so far
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Clusters in declaration order
    pub fn clusters(&self) -> &[(ClusterId, ClusterConfig)] {
        &self.clusters
    }

    pub fn cluster_config(&self, cluster_id: &ClusterId) -> Option<&ClusterConfig> {
        self.clusters
            .iter()
            .find(|(id, _)| id == cluster_id)
            .map(|(_, config)| config)
    }

    pub fn shape(&self, shape_id: &ShapeId) -> Option<&WorkloadShape> {
        self.shapes.get(shape_id)
    }

    pub fn capacity(&self) -> &CapacityModel {
        &self.capacity
    }

    pub fn ledger(&self) -> &TeamLedger {
        &self.ledger
    }

    pub fn queue(&self) -> &DemandQueue {
        &self.queue
    }

    /// Every job released so far, in release order
    pub fn completed_jobs(&self) -> &[Job] {
        &self.completed_jobs
    }

    /// Released jobs belonging to one team
    pub fn completed_jobs_for<'a>(&'a self, team_id: &'a TeamId) -> impl Iterator<Item = &'a Job> {
        self.completed_jobs
            .iter()
            .filter(move |job| &job.team_id == team_id)
    }
}
