//! Agora Market Simulator CLI
//!
//! Command-line harness for the market clearing engine: builds the reference
//! multi-cluster configuration, submits seeded synthetic demand, and runs
//! consecutive clearing periods.

use clap::Parser;
use std::collections::HashMap;
use std::fs;

use agora_core::{ClusterConfig, ClusterId, ShapeId, TeamId, WorkloadShape};
use agora_market_engine::{
    engine::MarketEngine,
    export::CycleSnapshot,
    sampler::UniformDurationSampler,
    synthetic::DemandGenerator,
};

#[derive(Parser, Debug)]
#[command(name = "agora-sim")]
#[command(about = "Simulate multi-cluster GPU spot market clearing", long_about = None)]
struct Args {
    /// Number of clearing periods to run
    #[arg(short, long, default_value_t = 12)]
    periods: u64,

    /// Seed for duration sampling and demand generation
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Mean demand requests per period
    #[arg(long, default_value_t = 6.0)]
    demand_rate: f64,

    /// Fraction of requests pinned to a random cluster
    #[arg(long, default_value_t = 0.3)]
    pinned_ratio: f64,

    /// Output JSON file for per-period snapshots (optional)
    #[arg(short, long)]
    output: Option<String>,
}

/// Reference cluster fleet (three regions, 8-GPU machines)
fn reference_clusters() -> Vec<(ClusterId, ClusterConfig)> {
    vec![
        (
            ClusterId::new("us-east-1"),
            ClusterConfig {
                total_machines: 128,
                guaranteed_machines: 30,
                base_guaranteed_price: 1.00,
                base_spot_price: 0.20,
                sensitivity_guaranteed: 2.0,
                sensitivity_spot: 1.2,
                machine_capacity_gpus: 8,
            },
        ),
        (
            ClusterId::new("eu-west-2"),
            ClusterConfig {
                total_machines: 64,
                guaranteed_machines: 40,
                base_guaranteed_price: 1.10,
                base_spot_price: 0.22,
                sensitivity_guaranteed: 2.2,
                sensitivity_spot: 1.3,
                machine_capacity_gpus: 8,
            },
        ),
        (
            ClusterId::new("ap-northeast-1"),
            ClusterConfig {
                total_machines: 256,
                guaranteed_machines: 10,
                base_guaranteed_price: 0.90,
                base_spot_price: 0.18,
                sensitivity_guaranteed: 1.8,
                sensitivity_spot: 1.1,
                machine_capacity_gpus: 8,
            },
        ),
    ]
}

/// Reference workload catalog
fn reference_shapes() -> HashMap<ShapeId, WorkloadShape> {
    HashMap::from([
        (
            ShapeId::new("inference"),
            WorkloadShape {
                gpus_per_unit: 1,
                min_duration_periods: 1,
                max_duration_periods: 6,
            },
        ),
        (
            ShapeId::new("training_batch"),
            WorkloadShape {
                gpus_per_unit: 4,
                min_duration_periods: 2,
                max_duration_periods: 24,
            },
        ),
        (
            ShapeId::new("large_training"),
            WorkloadShape {
                gpus_per_unit: 8,
                min_duration_periods: 12,
                max_duration_periods: 240,
            },
        ),
    ])
}

/// Reference team registry with initial budgets
fn reference_teams() -> Vec<(TeamId, f64)> {
    vec![
        (TeamId::new("product_research"), 1_000_000.0),
        (TeamId::new("production_platform"), 1_200_000.0),
        (TeamId::new("sales"), 800_000.0),
    ]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Agora Market Engine                                     ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Periods: {}", args.periods);
    println!("  Seed: {}", args.seed);
    println!("  Demand rate: {:.1} requests/period", args.demand_rate);
    println!("  Pinned ratio: {:.0}%\n", args.pinned_ratio * 100.0);

    let clusters = reference_clusters();
    let shapes = reference_shapes();
    let teams = reference_teams();

    let cluster_ids: Vec<ClusterId> = clusters.iter().map(|(id, _)| id.clone()).collect();
    let shape_ids: Vec<ShapeId> = shapes.keys().cloned().collect();
    let team_ids: Vec<TeamId> = teams.iter().map(|(id, _)| id.clone()).collect();
    let initial_budgets: HashMap<TeamId, f64> = teams.iter().cloned().collect();

    let mut engine = MarketEngine::new(
        clusters,
        shapes,
        teams,
        Box::new(UniformDurationSampler::from_seed(args.seed)),
    )
    .expect("reference configuration is valid");

    let mut generator = DemandGenerator::new(
        args.seed.wrapping_add(1),
        team_ids.clone(),
        shape_ids,
        cluster_ids.clone(),
        args.demand_rate,
        args.pinned_ratio,
    );

    let mut snapshots = Vec::new();

    println!(
        "{:<8} {:>10} {:>12} {:>12} {:>10}",
        "Period", "Requests", "Satisfied", "Unsatisfied", "Released"
    );
    println!("{}", "-".repeat(56));

    for _ in 0..args.periods {
        let requests = generator.generate();
        let request_count = requests.len();

        for request in requests {
            let submitted = match request.target_cluster {
                Some(cluster) => engine.submit_pinned(
                    request.team_id,
                    request.shape_id,
                    request.quantity,
                    cluster,
                ),
                None => {
                    engine.submit_floating(request.team_id, request.shape_id, request.quantity)
                }
            };
            if let Err(e) = submitted {
                eprintln!("Rejected request: {e}");
            }
        }

        let result = engine.run_clearing_period();

        println!(
            "{:<8} {:>10} {:>12} {:>12} {:>10}",
            result.period,
            request_count,
            result.plan.satisfied_units(),
            result.plan.unsatisfied_units(),
            result.jobs_released,
        );

        snapshots.push(CycleSnapshot::from_result(&result));
    }

    println!("\nSpot prices after period {}:", engine.period());
    if let Some(last) = snapshots.last() {
        for cluster_id in &cluster_ids {
            let price = last
                .clusters
                .get(cluster_id)
                .and_then(|c| c.spot_price)
                .map(|p| format!("{p:.4} BSC/GPU"))
                .unwrap_or_else(|| "Unavailable".to_string());
            println!("  {cluster_id}: {price}");
        }
    }

    println!(
        "\n{:<22} {:>14} {:>14} {:>8} {:>9} {:>10}",
        "Team", "Budget (BSC)", "Spent (BSC)", "Units", "Running", "Completed"
    );
    println!("{}", "-".repeat(82));

    for team_id in &team_ids {
        if let Some(state) = engine.ledger().team(team_id) {
            let running = engine.capacity().active_jobs_for(team_id).count();
            let completed = engine.completed_jobs_for(team_id).count();
            println!(
                "{:<22} {:>14.0} {:>14.0} {:>8} {:>9} {:>10}",
                team_id.to_string(),
                state.remaining_budget,
                state.total_spent,
                state.units_allocated,
                running,
                completed,
            );
            let initial = initial_budgets[team_id];
            debug_assert!((initial - state.remaining_budget - state.total_spent).abs() < 1e-6);
        }
    }

    if let Some(output_path) = args.output {
        println!("\nWriting snapshots to {output_path}...");
        let json = serde_json::to_string_pretty(&snapshots).unwrap();
        fs::write(&output_path, json).expect("Failed to write JSON output");
        println!("  Snapshots saved");
    }

    println!("\n✅ Simulation complete!\n");
}
