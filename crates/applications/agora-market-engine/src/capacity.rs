//! Machine-level capacity tracking and job lifecycle
//!
//! Each cluster owns a fixed fleet of spot-eligible machines
//! (`total_machines - guaranteed_machines`, created once at initialization).
//! Placement is first-fit in declared machine order, so a cycle's outcome is
//! fully determined by its inputs. Fragmentation is modeled, not abstracted:
//! allocation fails when no single machine fits, even if aggregate free
//! capacity across machines would suffice.

use std::collections::{BTreeMap, HashMap};

use agora_core::{ClusterConfig, ClusterId, TeamId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Job;

/// One spot-eligible machine with a fixed GPU capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    capacity_gpus: u32,
    available_gpus: u32,
    jobs: Vec<Job>,
}

impl Machine {
    fn new(capacity_gpus: u32) -> Self {
        Machine {
            capacity_gpus,
            available_gpus: capacity_gpus,
            jobs: Vec::new(),
        }
    }

    pub fn capacity_gpus(&self) -> u32 {
        self.capacity_gpus
    }

    pub fn available_gpus(&self) -> u32 {
        self.available_gpus
    }

    pub fn used_gpus(&self) -> u32 {
        self.capacity_gpus - self.available_gpus
    }

    /// Jobs currently occupying this machine
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn place(&mut self, job: Job) {
        self.available_gpus -= job.gpus_used;
        self.jobs.push(job);
    }

    /// Drop jobs whose completion period has arrived, reclaiming their GPUs
    fn release(&mut self, current_period: u64) -> Vec<Job> {
        let (kept, completed): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|job| job.is_active(current_period));

        self.jobs = kept;
        let gpus_in_use: u32 = self.jobs.iter().map(|job| job.gpus_used).sum();
        self.available_gpus = self.capacity_gpus - gpus_in_use;

        completed
    }
}

/// Capacity across every cluster's spot-eligible machines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityModel {
    clusters: BTreeMap<ClusterId, Vec<Machine>>,
}

impl CapacityModel {
    /// Build the spot fleet from cluster configuration
    pub fn new(clusters: &[(ClusterId, ClusterConfig)]) -> Self {
        let clusters = clusters
            .iter()
            .map(|(id, config)| {
                let machines = (0..config.spot_machines())
                    .map(|_| Machine::new(config.machine_capacity_gpus))
                    .collect();
                (id.clone(), machines)
            })
            .collect();

        CapacityModel { clusters }
    }

    /// Machines of one cluster, in stable declaration order
    pub fn machines(&self, cluster_id: &ClusterId) -> &[Machine] {
        self.clusters.get(cluster_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True iff any machine in the cluster has enough free GPUs
    pub fn can_fit(&self, cluster_id: &ClusterId, gpus_needed: u32) -> bool {
        self.machines(cluster_id)
            .iter()
            .any(|machine| machine.available_gpus >= gpus_needed)
    }

    /// First-fit placement: the job lands on the first machine whose free
    /// capacity suffices. Returns false, leaving every machine untouched,
    /// when no single machine fits.
    pub fn allocate(&mut self, cluster_id: &ClusterId, job: Job) -> bool {
        let Some(machines) = self.clusters.get_mut(cluster_id) else {
            return false;
        };

        for machine in machines.iter_mut() {
            if machine.available_gpus >= job.gpus_used {
                machine.place(job);
                return true;
            }
        }
        false
    }

    /// Release completed jobs across every machine, returning them for the
    /// history. Runs once, before any allocation, at the start of a cycle.
    pub fn release(&mut self, current_period: u64) -> Vec<Job> {
        let mut completed = Vec::new();
        for machines in self.clusters.values_mut() {
            for machine in machines.iter_mut() {
                completed.extend(machine.release(current_period));
            }
        }
        if !completed.is_empty() {
            debug!(period = current_period, released = completed.len(), "released completed jobs");
        }
        completed
    }

    /// GPUs currently in use, per cluster
    pub fn gpu_usage(&self) -> HashMap<ClusterId, u32> {
        self.clusters
            .iter()
            .map(|(id, machines)| {
                let used = machines.iter().map(Machine::used_gpus).sum();
                (id.clone(), used)
            })
            .collect()
    }

    /// Free GPUs across one cluster's machines
    pub fn available_gpus(&self, cluster_id: &ClusterId) -> u32 {
        self.machines(cluster_id)
            .iter()
            .map(Machine::available_gpus)
            .sum()
    }

    /// Every job currently occupying a machine
    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.clusters
            .values()
            .flat_map(|machines| machines.iter())
            .flat_map(|machine| machine.jobs.iter())
    }

    /// Active jobs belonging to one team
    pub fn active_jobs_for<'a>(&'a self, team_id: &'a TeamId) -> impl Iterator<Item = &'a Job> {
        self.active_jobs().filter(move |job| &job.team_id == team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ShapeId;

    fn cluster(total: u32, guaranteed: u32) -> (ClusterId, ClusterConfig) {
        (
            ClusterId::new("c1"),
            ClusterConfig {
                total_machines: total,
                guaranteed_machines: guaranteed,
                base_guaranteed_price: 1.0,
                base_spot_price: 0.2,
                sensitivity_guaranteed: 2.0,
                sensitivity_spot: 1.2,
                machine_capacity_gpus: 8,
            },
        )
    }

    fn job(gpus: u32, start: u64, duration: u64) -> Job {
        Job {
            shape_id: ShapeId::new("batch"),
            gpus_used: gpus,
            team_id: TeamId::new("t1"),
            start_period: start,
            duration,
            completion_period: start + duration,
            cost: 1.0,
        }
    }

    #[test]
    fn test_only_spot_machines_are_modeled() {
        let model = CapacityModel::new(&[cluster(4, 3)]);
        assert_eq!(model.machines(&ClusterId::new("c1")).len(), 1);

        let model = CapacityModel::new(&[cluster(4, 4)]);
        assert!(model.machines(&ClusterId::new("c1")).is_empty());
        assert!(!model.can_fit(&ClusterId::new("c1"), 1));
    }

    #[test]
    fn test_first_fit_prefers_earliest_machine() {
        let id = ClusterId::new("c1");
        let mut model = CapacityModel::new(&[cluster(3, 0)]);

        assert!(model.allocate(&id, job(4, 1, 1)));
        assert!(model.allocate(&id, job(4, 1, 1)));
        // First machine is now full; the next job spills onto the second.
        assert!(model.allocate(&id, job(2, 1, 1)));

        let machines = model.machines(&id);
        assert_eq!(machines[0].available_gpus(), 0);
        assert_eq!(machines[1].available_gpus(), 6);
        assert_eq!(machines[2].available_gpus(), 8);
    }

    #[test]
    fn test_fragmentation_blocks_large_shapes() {
        let id = ClusterId::new("c1");
        let mut model = CapacityModel::new(&[cluster(2, 0)]);

        assert!(model.allocate(&id, job(5, 1, 10)));
        assert!(model.allocate(&id, job(5, 1, 10)));

        // 3 GPUs free on each machine, 6 in aggregate, but no single machine
        // can take a 6-GPU job.
        assert_eq!(model.available_gpus(&id), 6);
        assert!(!model.can_fit(&id, 6));
        assert!(!model.allocate(&id, job(6, 1, 1)));
        assert_eq!(model.available_gpus(&id), 6);
    }

    #[test]
    fn test_release_reclaims_capacity_at_completion() {
        let id = ClusterId::new("c1");
        let mut model = CapacityModel::new(&[cluster(1, 0)]);

        // Allocated at period 1 with duration 2: active through periods 1-2,
        // gone from period 3 on.
        assert!(model.allocate(&id, job(8, 1, 2)));

        assert!(model.release(2).is_empty());
        assert_eq!(model.available_gpus(&id), 0);

        let completed = model.release(3);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].completion_period, 3);
        assert_eq!(model.available_gpus(&id), 8);
        assert_eq!(model.active_jobs().count(), 0);
    }

    #[test]
    fn test_capacity_never_oversold() {
        let id = ClusterId::new("c1");
        let mut model = CapacityModel::new(&[cluster(2, 0)]);

        let mut placed = 0;
        while model.allocate(&id, job(4, 1, 5)) {
            placed += 1;
        }
        assert_eq!(placed, 4);

        for machine in model.machines(&id) {
            let used: u32 = machine.jobs().iter().map(|j| j.gpus_used).sum();
            assert!(used <= machine.capacity_gpus());
            assert_eq!(machine.available_gpus(), machine.capacity_gpus() - used);
        }
    }
}
