//! Round and wallet ledger with exactly-once economic effect.
//!
//! This module implements:
//! - Idempotency keys with persisted result reconstruction, so replays
//!   survive process restarts
//! - A monotonic round lifecycle (OPEN -> COMPLETED, OPEN -> ROLLED_BACK)
//! - Signed-delta balance accounting over an append-only transaction ledger
//! - ACID-compliant atomic units per operation
//! - An append-only audit trail of round events
//!
//! ## Example
//!
//! ```no_run
//! use rgs_ledger::db::{Database, ensure_schema};
//! use rgs_ledger::ledger::{LedgerManager, PlayRequest, SessionRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     ensure_schema(db.pool()).await?;
//!     let ledger = LedgerManager::new(Arc::new(db.pool().clone()));
//!
//!     let account = ledger
//!         .session(SessionRequest {
//!             operator_id: "op1".to_string(),
//!             player_id: "player1".to_string(),
//!             currency: "EUR".to_string(),
//!         })
//!         .await?;
//!     println!("Balance: {}", account.balance);
//!
//!     // Place a wager; retries with the same key are safe
//!     let outcome = ledger
//!         .play(PlayRequest {
//!             operator_id: "op1".to_string(),
//!             player_id: "player1".to_string(),
//!             game_id: "scratch-7s".to_string(),
//!             currency: "EUR".to_string(),
//!             wager: 200,
//!             idempotency_key: "play_unique_key".to_string(),
//!         })
//!         .await?;
//!     println!("Round {} opened, balance {}", outcome.round_id, outcome.balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod fingerprint;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::LedgerManager;
pub use models::{
    Account, AccountId, CompleteOutcome, CompleteRequest, EventType, LedgerTransaction,
    PlayOutcome, PlayRequest, RollbackOutcome, RollbackRequest, Round, RoundEvent, RoundStatus,
    SessionRequest, TransactionId, TransactionType,
};
