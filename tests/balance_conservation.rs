/// Property-based tests for the ledger's accounting rules using proptest
///
/// A reference model applies random operation sequences through the crate's
/// pure rules (transition legality and the signed-delta convention) and
/// verifies the conservation laws that the stored ledger must uphold:
/// the balance always equals the signed sum of committed transactions,
/// terminal statuses are frozen, rolled-back rounds net to zero, and
/// completed rounds net to exactly win minus wager.
use proptest::prelude::*;
use rgs_ledger::ledger::{RoundStatus, TransactionType};
use std::collections::HashMap;

const STARTING_BALANCE: i64 = 10_000;

#[derive(Debug, Clone)]
enum Op {
    /// Admit a wager under a (possibly reused) play key
    Play { key: usize, wager: i64 },
    /// Credit a win while the round is still open
    EarlyWin { round: usize, win: i64 },
    /// Resolve a round with a win amount
    Complete { round: usize, win: i64 },
    /// Void a round under a (possibly reused) rollback key
    Rollback { round: usize, key: usize },
}

#[derive(Debug, Clone)]
struct ModelRound {
    status: RoundStatus,
    wager: i64,
    win: Option<i64>,
    entries: Vec<(TransactionType, i64)>,
}

/// Reference model of one account's ledger
#[derive(Debug, Default)]
struct Model {
    balance: i64,
    rounds: Vec<ModelRound>,
    play_keys: HashMap<usize, usize>,
    rollback_keys: HashMap<usize, usize>,
}

impl Model {
    fn new() -> Self {
        Self {
            balance: STARTING_BALANCE,
            ..Default::default()
        }
    }

    fn post(&mut self, round: usize, entry_type: TransactionType, amount: i64) {
        self.balance += entry_type.signed_delta(amount);
        self.rounds[round].entries.push((entry_type, amount));
    }

    fn round_index(&self, raw: usize) -> Option<usize> {
        if self.rounds.is_empty() {
            None
        } else {
            Some(raw % self.rounds.len())
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Play { key, wager } => {
                if self.play_keys.contains_key(&key) {
                    // Replay: the original result stands, nothing changes
                    return;
                }
                if self.balance < wager {
                    // Rejected before any row exists
                    return;
                }
                self.rounds.push(ModelRound {
                    status: RoundStatus::Open,
                    wager,
                    win: None,
                    entries: Vec::new(),
                });
                let idx = self.rounds.len() - 1;
                self.post(idx, TransactionType::Bet, wager);
                self.play_keys.insert(key, idx);
            }
            Op::EarlyWin { round, win } => {
                let Some(idx) = self.round_index(round) else {
                    return;
                };
                if self.rounds[idx].status != RoundStatus::Open
                    || self.rounds[idx].win.is_some()
                {
                    return;
                }
                self.post(idx, TransactionType::Win, win);
                self.rounds[idx].win = Some(win);
            }
            Op::Complete { round, win } => {
                let Some(idx) = self.round_index(round) else {
                    return;
                };
                match self.rounds[idx].status {
                    // Replay of a completed round re-credits nothing
                    RoundStatus::Completed => {}
                    // Illegal transition, rejected without mutation
                    RoundStatus::RolledBack => {}
                    RoundStatus::Open => {
                        assert!(
                            self.rounds[idx]
                                .status
                                .can_transition(RoundStatus::Completed)
                        );
                        if self.rounds[idx].win.is_none() {
                            self.post(idx, TransactionType::Win, win);
                            self.rounds[idx].win = Some(win);
                        }
                        self.rounds[idx].status = RoundStatus::Completed;
                    }
                }
            }
            Op::Rollback { round, key } => {
                let Some(idx) = self.round_index(round) else {
                    return;
                };
                if self.rollback_keys.contains_key(&key) {
                    // Same-key replay or a cross-round conflict; neither mutates
                    return;
                }
                if self.rounds[idx].status.is_terminal() {
                    return;
                }
                assert!(
                    self.rounds[idx]
                        .status
                        .can_transition(RoundStatus::RolledBack)
                );
                let wager = self.rounds[idx].wager;
                self.post(idx, TransactionType::RollbackBet, wager);
                if let Some(win) = self.rounds[idx].win {
                    self.post(idx, TransactionType::RollbackWin, win);
                }
                self.rounds[idx].status = RoundStatus::RolledBack;
                self.rollback_keys.insert(key, idx);
            }
        }
    }

    fn signed_sum(&self) -> i64 {
        self.rounds
            .iter()
            .flat_map(|r| r.entries.iter())
            .map(|&(entry_type, amount)| entry_type.signed_delta(amount))
            .sum()
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize, 0..600i64).prop_map(|(key, wager)| Op::Play { key, wager }),
        (0..12usize, 0..400i64).prop_map(|(round, win)| Op::EarlyWin { round, win }),
        (0..12usize, 0..400i64).prop_map(|(round, win)| Op::Complete { round, win }),
        (0..12usize, 0..8usize).prop_map(|(round, key)| Op::Rollback { round, key }),
    ]
}

proptest! {
    #[test]
    fn test_balance_equals_signed_transaction_sum(
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
            prop_assert_eq!(
                model.balance,
                STARTING_BALANCE + model.signed_sum(),
                "Balance drifted from the transaction ledger after {:?}",
                op
            );
        }
    }

    #[test]
    fn test_terminal_statuses_are_frozen(
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let mut model = Model::new();
        for op in &ops {
            let before: Vec<RoundStatus> = model.rounds.iter().map(|r| r.status).collect();
            model.apply(op);
            for (idx, status) in before.iter().enumerate() {
                if status.is_terminal() {
                    prop_assert_eq!(
                        model.rounds[idx].status,
                        *status,
                        "Terminal round {} changed status",
                        idx
                    );
                }
            }
        }
    }

    #[test]
    fn test_rolled_back_rounds_net_to_zero(
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
        }
        for (idx, round) in model.rounds.iter().enumerate() {
            let net: i64 = round
                .entries
                .iter()
                .map(|&(entry_type, amount)| entry_type.signed_delta(amount))
                .sum();
            match round.status {
                RoundStatus::RolledBack => {
                    prop_assert_eq!(net, 0, "Rolled-back round {} left residue", idx);
                }
                RoundStatus::Completed => {
                    let win = round.win.expect("completed rounds carry a win");
                    prop_assert_eq!(
                        net,
                        win - round.wager,
                        "Completed round {} should net win - wager",
                        idx
                    );
                }
                RoundStatus::Open => {}
            }
        }
    }

    #[test]
    fn test_one_round_per_play_key(
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
        }
        // Every admitted round is owned by exactly one key
        prop_assert_eq!(model.play_keys.len(), model.rounds.len());
    }
}
