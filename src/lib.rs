//! # RGS Ledger
//!
//! A remote-game-server wallet and round ledger with transactional
//! integrity: real-money-equivalent game outcomes are recorded with
//! exactly-once economic effect, no matter how many times an unreliable
//! caller retries a request.
//!
//! The ledger is a library boundary consumed over four operations:
//!
//! - **session**: ensure an account exists for an (operator, player,
//!   currency) triple
//! - **play**: admit a wager, opening a round in `OPEN` state and debiting
//!   the account
//! - **complete**: resolve a round (`OPEN` -> `COMPLETED`), crediting any win
//! - **rollback**: void an in-flight round (`OPEN` -> `ROLLED_BACK`),
//!   reversing its monetary effects
//!
//! `play` and `rollback` are idempotent under caller-supplied keys: a replay
//! returns the original result, reconstructed from persisted rows, without
//! re-executing side effects. Every operation runs as one database
//! transaction, and the account balance always equals the signed sum of the
//! committed transactions that reference it.
//!
//! ## Core Modules
//!
//! - [`ledger`]: models, round state machine, request fingerprinting, and
//!   the [`ledger::LedgerManager`] executing the four operations
//! - [`db`]: PostgreSQL pooling, configuration, and schema bootstrap
//!
//! ## Example
//!
//! ```no_run
//! use rgs_ledger::db::{Database, DatabaseConfig, ensure_schema};
//! use rgs_ledger::LedgerManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     ensure_schema(db.pool()).await?;
//!     let ledger = LedgerManager::new(Arc::new(db.pool().clone()));
//!     let _ = ledger;
//!     Ok(())
//! }
//! ```

/// Database connection pooling, configuration, and schema bootstrap.
pub mod db;
pub use db::{Database, DatabaseConfig};

/// Ledger models, state machine, and operations.
pub mod ledger;
pub use ledger::{
    Account, CompleteOutcome, CompleteRequest, LedgerError, LedgerManager, LedgerResult,
    PlayOutcome, PlayRequest, RollbackOutcome, RollbackRequest, Round, RoundStatus,
    SessionRequest, TransactionType,
};
