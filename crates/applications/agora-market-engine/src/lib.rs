//! Agora Market Engine
//!
//! Periodic market-clearing and allocation for a multi-cluster GPU spot
//! market. Teams submit pinned or floating demand between cycles; each call
//! to [`engine::MarketEngine::run_clearing_period`] releases finished jobs,
//! discovers prices, walks demand unit-by-unit onto machine capacity, and
//! charges team budgets.

pub mod capacity;
pub mod demand;
pub mod engine;
pub mod export;
pub mod ledger;
pub mod pricing;
pub mod sampler;
pub mod synthetic;
pub mod types;
