//! Ledger data models and the round lifecycle rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account ID type
pub type AccountId = i64;

/// Transaction ID type
pub type TransactionId = i64;

/// Player wallet account, one per (operator, player, currency)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub operator_id: String,
    pub player_id: String,
    pub currency: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Round lifecycle status
///
/// A round enters `Open` on admission of its play request. `Completed` and
/// `RolledBack` are terminal: once reached, no further transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Open,
    Completed,
    RolledBack,
}

impl RoundStatus {
    /// Whether no further status change is permitted from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundStatus::Completed | RoundStatus::RolledBack)
    }

    /// Whether a transition to `to` is legal from this state.
    ///
    /// Self-transitions on terminal states are not legal transitions; they
    /// are handled above this layer as replays.
    pub fn can_transition(self, to: RoundStatus) -> bool {
        matches!(
            (self, to),
            (RoundStatus::Open, RoundStatus::Completed)
                | (RoundStatus::Open, RoundStatus::RolledBack)
        )
    }

    /// Parse the persisted representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(RoundStatus::Open),
            "COMPLETED" => Some(RoundStatus::Completed),
            "ROLLED_BACK" => Some(RoundStatus::RolledBack),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundStatus::Open => write!(f, "OPEN"),
            RoundStatus::Completed => write!(f, "COMPLETED"),
            RoundStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// Round model, one per admitted play request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_id: Uuid,
    pub account_id: AccountId,
    pub player_id: String,
    pub game_id: String,
    pub wager: i64,
    pub win: Option<i64>,
    pub status: RoundStatus,
    pub play_key: String,
    pub play_fingerprint: String,
    pub rollback_key: Option<String>,
    pub bet_transaction_id: Option<TransactionId>,
    pub win_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

/// Transaction type
///
/// Amounts are stored as non-negative magnitudes; the sign applied to the
/// account balance is implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Bet,
    Win,
    RollbackBet,
    RollbackWin,
    Deposit,
}

impl TransactionType {
    /// Signed balance delta for a magnitude of `amount`.
    ///
    /// `Bet` and `RollbackWin` decrease the balance; `Win`, `RollbackBet`,
    /// and `Deposit` increase it.
    pub fn signed_delta(self, amount: i64) -> i64 {
        match self {
            TransactionType::Bet | TransactionType::RollbackWin => -amount,
            TransactionType::Win | TransactionType::RollbackBet | TransactionType::Deposit => {
                amount
            }
        }
    }

    /// Parse the persisted representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BET" => Some(TransactionType::Bet),
            "WIN" => Some(TransactionType::Win),
            "ROLLBACK_BET" => Some(TransactionType::RollbackBet),
            "ROLLBACK_WIN" => Some(TransactionType::RollbackWin),
            "DEPOSIT" => Some(TransactionType::Deposit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Bet => write!(f, "BET"),
            TransactionType::Win => write!(f, "WIN"),
            TransactionType::RollbackBet => write!(f, "ROLLBACK_BET"),
            TransactionType::RollbackWin => write!(f, "ROLLBACK_WIN"),
            TransactionType::Deposit => write!(f, "DEPOSIT"),
        }
    }
}

/// Committed monetary movement (immutable once written)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub round_id: Option<Uuid>,
    pub entry_type: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Play,
    Complete,
    Rollback,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Play => write!(f, "PLAY"),
            EventType::Complete => write!(f, "COMPLETE"),
            EventType::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

/// Append-only audit record for a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEvent {
    pub id: i64,
    pub round_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Session request: ensure an account exists for the player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub operator_id: String,
    pub player_id: String,
    pub currency: String,
}

/// Play request: open a round and debit the wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub operator_id: String,
    pub player_id: String,
    pub game_id: String,
    pub currency: String,
    pub wager: i64,
    pub idempotency_key: String,
}

/// Play outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayOutcome {
    pub round_id: Uuid,
    pub bet_transaction_id: TransactionId,
    pub balance: i64,
}

/// Complete request: resolve a round, crediting any win
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub round_id: Uuid,
    pub player_id: String,
    pub game_id: String,
    pub win: i64,
}

/// Complete outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOutcome {
    pub round_id: Uuid,
    pub status: RoundStatus,
    pub win_transaction_id: TransactionId,
    pub balance: i64,
}

/// Rollback request: void an in-flight round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub round_id: Uuid,
    pub player_id: String,
    pub idempotency_key: String,
}

/// Rollback outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub round_id: Uuid,
    pub status: RoundStatus,
    pub reversal_transaction_ids: Vec<TransactionId>,
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_not_terminal() {
        assert!(!RoundStatus::Open.is_terminal());
        assert!(RoundStatus::Completed.is_terminal());
        assert!(RoundStatus::RolledBack.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(RoundStatus::Open.can_transition(RoundStatus::Completed));
        assert!(RoundStatus::Open.can_transition(RoundStatus::RolledBack));
    }

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        for from in [RoundStatus::Completed, RoundStatus::RolledBack] {
            for to in [
                RoundStatus::Open,
                RoundStatus::Completed,
                RoundStatus::RolledBack,
            ] {
                assert!(!from.can_transition(to), "{from} -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn test_open_cannot_reenter_open() {
        assert!(!RoundStatus::Open.can_transition(RoundStatus::Open));
    }

    #[test]
    fn test_status_round_trips_through_display() {
        for status in [
            RoundStatus::Open,
            RoundStatus::Completed,
            RoundStatus::RolledBack,
        ] {
            assert_eq!(RoundStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(RoundStatus::parse("VOIDED"), None);
    }

    #[test]
    fn test_sign_convention() {
        assert_eq!(TransactionType::Bet.signed_delta(200), -200);
        assert_eq!(TransactionType::Win.signed_delta(350), 350);
        assert_eq!(TransactionType::RollbackBet.signed_delta(200), 200);
        assert_eq!(TransactionType::RollbackWin.signed_delta(350), -350);
        assert_eq!(TransactionType::Deposit.signed_delta(10_000), 10_000);
    }

    #[test]
    fn test_zero_amounts_are_sign_neutral() {
        for entry_type in [
            TransactionType::Bet,
            TransactionType::Win,
            TransactionType::RollbackBet,
            TransactionType::RollbackWin,
            TransactionType::Deposit,
        ] {
            assert_eq!(entry_type.signed_delta(0), 0);
        }
    }

    #[test]
    fn test_rollback_reverses_exactly() {
        // A rollback pair must cancel the original pair for any magnitudes.
        let wager = 200;
        let win = 350;
        let net = TransactionType::Bet.signed_delta(wager)
            + TransactionType::Win.signed_delta(win)
            + TransactionType::RollbackBet.signed_delta(wager)
            + TransactionType::RollbackWin.signed_delta(win);
        assert_eq!(net, 0);
    }

    #[test]
    fn test_entry_type_round_trips_through_display() {
        for entry_type in [
            TransactionType::Bet,
            TransactionType::Win,
            TransactionType::RollbackBet,
            TransactionType::RollbackWin,
            TransactionType::Deposit,
        ] {
            assert_eq!(
                TransactionType::parse(&entry_type.to_string()),
                Some(entry_type)
            );
        }
    }
}
