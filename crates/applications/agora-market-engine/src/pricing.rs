//! Price discovery for guaranteed and spot capacity
//!
//! Pure functions over cluster configuration and GPU usage. Guaranteed
//! prices depend only on the reserved share of the fleet; spot prices follow
//! the demand/supply ratio and are clamped to a hard floor and ceiling
//! around the base price. A cluster with no spot supply prices at infinity
//! and can never clear an allocation.

use agora_core::ClusterConfig;

/// Hard floor on the spot price, as a multiple of the base spot price
pub const SPOT_PRICE_FLOOR_FACTOR: f64 = 0.5;

/// Hard ceiling on the spot price, as a multiple of the base spot price
pub const SPOT_PRICE_CEILING_FACTOR: f64 = 10.0;

/// Price of reserving a whole machine for one period
///
/// Independent of spot demand: scales the per-GPU base by machine capacity
/// and by how much of the fleet is already reserved.
pub fn guaranteed_price(config: &ClusterConfig) -> f64 {
    let utilization = config.guaranteed_machines as f64 / config.total_machines as f64;
    let adjustment = (1.0 + utilization).powf(config.sensitivity_guaranteed);
    config.base_guaranteed_price * config.machine_capacity_gpus as f64 * adjustment
}

/// Spot price per GPU at the given demand level
///
/// Returns `f64::INFINITY` when the cluster has no spot supply; no
/// allocation against such a cluster is ever affordable. The demand floor of
/// one GPU avoids a degenerate zero price at zero load.
pub fn spot_price_per_gpu(config: &ClusterConfig, demand_gpus: u32) -> f64 {
    let supply_gpus = config.spot_supply_gpus();
    if supply_gpus == 0 {
        return f64::INFINITY;
    }

    let demand = demand_gpus.max(1) as f64;
    let ratio = demand / supply_gpus as f64;
    let raw = config.base_spot_price * ratio.powf(config.sensitivity_spot);

    let floor = config.base_spot_price * SPOT_PRICE_FLOOR_FACTOR;
    let ceiling = config.base_spot_price * SPOT_PRICE_CEILING_FACTOR;
    raw.clamp(floor, ceiling)
}
