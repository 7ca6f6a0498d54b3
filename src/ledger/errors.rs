//! Ledger error types.

use thiserror::Error;
use uuid::Uuid;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage error (transient infrastructure failure; safe to retry
    /// with the same idempotency key)
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Insufficient funds for a wager
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Account not found
    #[error("Account not found for player {player_id} ({currency})")]
    AccountNotFound { player_id: String, currency: String },

    /// Round not found
    #[error("Round not found: {0}")]
    RoundNotFound(Uuid),

    /// Round is not in a state that permits the requested transition
    #[error("Invalid round state: round {round_id} is {status}")]
    InvalidRoundState { round_id: Uuid, status: String },

    /// Idempotency key reused for a logically different request
    #[error("Idempotency conflict on key {0}")]
    IdempotencyConflict(String),

    /// Idempotency key missing on a side-effecting operation
    #[error("Idempotency key must be non-empty")]
    MissingIdempotencyKey,

    /// Invalid amount (wager and win must be non-negative)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance arithmetic would overflow
    #[error("Balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage errors are sanitized to prevent information disclosure about
    /// the internal system structure, and account identifiers are redacted.
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize storage errors - don't expose SQL details
            LedgerError::Storage(_) => "Internal server error".to_string(),
            // Sanitize account not found - don't expose player identifiers
            LedgerError::AccountNotFound { .. } => "Account not found".to_string(),
            // All other errors are safe to expose
            _ => self.to_string(),
        }
    }

    /// Whether the caller may safely retry the operation verbatim
    /// (same idempotency key).
    pub fn is_retriable(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_sanitizes_storage() {
        let err = LedgerError::Storage(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.is_retriable());
    }

    #[test]
    fn test_client_message_redacts_account() {
        let err = LedgerError::AccountNotFound {
            player_id: "p-123".to_string(),
            currency: "EUR".to_string(),
        };
        assert_eq!(err.client_message(), "Account not found");
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_client_message_passes_business_errors() {
        let err = LedgerError::InsufficientFunds {
            available: 100,
            required: 250,
        };
        assert!(err.client_message().contains("available 100"));
        assert!(err.client_message().contains("required 250"));
    }
}
