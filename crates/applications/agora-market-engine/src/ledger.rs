//! Per-team budgets and spend statistics
//!
//! Budgets only ever decrease, through successful charges; a charge that
//! would drive a budget negative is refused and changes nothing. Cumulative
//! counters advance only alongside a successful charge.

use std::collections::HashMap;

use agora_core::TeamId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Budget and cumulative usage for one team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamState {
    pub remaining_budget: f64,
    pub total_spent: f64,
    pub units_allocated: u64,
}

/// Budgets and statistics for every registered team
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamLedger {
    teams: HashMap<TeamId, TeamState>,
}

impl TeamLedger {
    pub fn new(teams: impl IntoIterator<Item = (TeamId, f64)>) -> Self {
        let teams = teams
            .into_iter()
            .map(|(id, budget)| {
                (
                    id,
                    TeamState {
                        remaining_budget: budget,
                        total_spent: 0.0,
                        units_allocated: 0,
                    },
                )
            })
            .collect();
        TeamLedger { teams }
    }

    pub fn contains(&self, team_id: &TeamId) -> bool {
        self.teams.contains_key(team_id)
    }

    pub fn team(&self, team_id: &TeamId) -> Option<&TeamState> {
        self.teams.get(team_id)
    }

    /// Budget still available to the team; an unknown team can afford nothing
    pub fn remaining_budget(&self, team_id: &TeamId) -> f64 {
        self.teams
            .get(team_id)
            .map_or(0.0, |state| state.remaining_budget)
    }

    /// Atomic check-then-debit. Returns false, changing nothing, when the
    /// team is unknown, the amount is not a finite nonnegative number, or
    /// the charge would drive the budget negative.
    pub fn charge(&mut self, team_id: &TeamId, amount: f64) -> bool {
        if !amount.is_finite() || amount < 0.0 {
            return false;
        }
        let Some(state) = self.teams.get_mut(team_id) else {
            return false;
        };
        if state.remaining_budget < amount {
            debug!(team = %team_id, amount, remaining = state.remaining_budget, "charge refused");
            return false;
        }

        state.remaining_budget -= amount;
        state.total_spent += amount;
        state.units_allocated += 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TeamId, &TeamState)> {
        self.teams.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> TeamLedger {
        TeamLedger::new([(TeamId::new("t1"), 10.0)])
    }

    #[test]
    fn test_charge_debits_and_counts() {
        let mut ledger = ledger();
        let t1 = TeamId::new("t1");

        assert!(ledger.charge(&t1, 4.0));
        assert!(ledger.charge(&t1, 6.0));

        let state = ledger.team(&t1).unwrap();
        assert_eq!(state.remaining_budget, 0.0);
        assert_eq!(state.total_spent, 10.0);
        assert_eq!(state.units_allocated, 2);
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let mut ledger = ledger();
        let t1 = TeamId::new("t1");

        assert!(!ledger.charge(&t1, 10.5));

        let state = ledger.team(&t1).unwrap();
        assert_eq!(state.remaining_budget, 10.0);
        assert_eq!(state.total_spent, 0.0);
        assert_eq!(state.units_allocated, 0);
    }

    #[test]
    fn test_budget_never_negative() {
        let mut ledger = ledger();
        let t1 = TeamId::new("t1");
        let initial = ledger.remaining_budget(&t1);

        for amount in [3.0, 3.0, 3.0, 3.0, 3.0] {
            ledger.charge(&t1, amount);
            let state = ledger.team(&t1).unwrap();
            assert!(state.remaining_budget >= 0.0);
            assert!((initial - state.remaining_budget - state.total_spent).abs() < 1e-9);
        }
    }

    #[test]
    fn test_infinite_charge_is_refused() {
        let mut ledger = ledger();
        let t1 = TeamId::new("t1");

        assert!(!ledger.charge(&t1, f64::INFINITY));
        assert_eq!(ledger.remaining_budget(&t1), 10.0);
    }

    #[test]
    fn test_unknown_team_cannot_be_charged() {
        let mut ledger = ledger();
        let ghost = TeamId::new("ghost");

        assert_eq!(ledger.remaining_budget(&ghost), 0.0);
        assert!(!ledger.charge(&ghost, 1.0));
    }
}
