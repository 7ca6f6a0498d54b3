//! Schema bootstrap for the ledger tables.
//!
//! The uniqueness constraints declared here are the enforcement mechanism
//! for the idempotency invariants, not an optimization: duplicate play keys,
//! duplicate rollback keys, and duplicate (entry_type, idempotency_key)
//! pairs are rejected by the database even when two units of work race past
//! the application-level checks.

use sqlx::PgPool;

/// DDL statements, applied in dependency order.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id BIGSERIAL PRIMARY KEY,
        operator_id TEXT NOT NULL,
        player_id TEXT NOT NULL,
        currency TEXT NOT NULL,
        balance BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
        UNIQUE (operator_id, player_id, currency)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rounds (
        round_id UUID PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        player_id TEXT NOT NULL,
        game_id TEXT NOT NULL,
        wager BIGINT NOT NULL,
        win BIGINT,
        status TEXT NOT NULL,
        play_key TEXT NOT NULL UNIQUE,
        play_fingerprint TEXT NOT NULL,
        rollback_key TEXT UNIQUE,
        bet_transaction_id BIGINT,
        win_transaction_id BIGINT,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        completed_at TIMESTAMP,
        rolled_back_at TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_transactions (
        id BIGSERIAL PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        round_id UUID REFERENCES rounds(round_id),
        entry_type TEXT NOT NULL,
        amount BIGINT NOT NULL CHECK (amount >= 0),
        balance_after BIGINT NOT NULL,
        idempotency_key TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        UNIQUE (entry_type, idempotency_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS round_events (
        id BIGSERIAL PRIMARY KEY,
        round_id UUID NOT NULL REFERENCES rounds(round_id),
        event_type TEXT NOT NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_transactions_account
        ON ledger_transactions (account_id, created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_transactions_round
        ON ledger_transactions (round_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_round_events_round
        ON round_events (round_id, id)
    "#,
];

/// Create the ledger tables and indexes if they do not exist.
///
/// Safe to run on every startup.
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// * `Result<(), sqlx::Error>` - Ok once all statements applied
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    log::info!("Ledger schema ensured");
    Ok(())
}
