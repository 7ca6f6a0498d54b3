//! Ledger manager: the four wallet operations as atomic units of work.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{LedgerError, LedgerResult},
    fingerprint::{play_fingerprint, rollback_fingerprint},
    models::{
        Account, AccountId, CompleteOutcome, CompleteRequest, EventType, LedgerTransaction,
        PlayOutcome, PlayRequest, RollbackOutcome, RollbackRequest, Round, RoundEvent,
        RoundStatus, SessionRequest, TransactionId, TransactionType,
    },
};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Ledger manager
///
/// Every operation executes as a single database transaction: idempotency
/// check, balance mutation, round/transaction/event inserts all commit or
/// roll back together. The account row and (for `complete`/`rollback`) the
/// round row are locked for the duration of the unit, and the uniqueness
/// constraints on `play_key`, `rollback_key`, and
/// `(entry_type, idempotency_key)` backstop any race the check-then-insert
/// window admits.
#[derive(Clone)]
pub struct LedgerManager {
    pool: Arc<PgPool>,
    opening_grant: i64,
}

impl LedgerManager {
    /// Create a new ledger manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    ///
    /// # Returns
    ///
    /// * `LedgerManager` - New ledger manager instance
    pub fn new(pool: Arc<PgPool>) -> Self {
        let opening_grant = std::env::var("DEFAULT_ACCOUNT_BALANCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10000);

        Self {
            pool,
            opening_grant,
        }
    }

    /// Create a manager with an explicit opening grant (0 disables it)
    pub fn with_opening_grant(pool: Arc<PgPool>, opening_grant: i64) -> Self {
        Self {
            pool,
            opening_grant,
        }
    }

    /// Ensure an account exists for the player
    ///
    /// Accounts are created lazily on first sight of an
    /// (operator, player, currency) triple and never deleted. A configured
    /// opening grant is recorded as a `DEPOSIT` transaction so the balance
    /// invariant holds from the first row.
    ///
    /// # Arguments
    ///
    /// * `request` - Session request with operator, player, and currency
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Account>` - The ensured account or error
    pub async fn session(&self, request: SessionRequest) -> LedgerResult<Account> {
        let mut tx = self.pool.begin().await?;
        let account = self
            .ensure_account(
                &mut tx,
                &request.operator_id,
                &request.player_id,
                &request.currency,
            )
            .await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Place a wager: open a round and debit the account
    ///
    /// Idempotent under the caller-supplied key: replays return the original
    /// result without touching storage, and a key reused for a different
    /// payload fails with `IdempotencyConflict`. Two concurrent calls with
    /// the same key produce exactly one round; the loser of the race
    /// observes the winner's result as a replay.
    ///
    /// # Arguments
    ///
    /// * `request` - Play request
    ///
    /// # Returns
    ///
    /// * `LedgerResult<PlayOutcome>` - Round id, bet transaction id, and
    ///   resulting balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - Wager exceeds the balance; no
    ///   round or transaction row is created
    /// * `LedgerError::IdempotencyConflict` - Key reused with a different
    ///   payload
    pub async fn play(&self, request: PlayRequest) -> LedgerResult<PlayOutcome> {
        if request.wager < 0 {
            return Err(LedgerError::InvalidAmount(request.wager));
        }
        if request.idempotency_key.is_empty() {
            return Err(LedgerError::MissingIdempotencyKey);
        }

        let fingerprint = play_fingerprint(&request);

        // Replay check against committed state
        if let Some(outcome) = self.try_replay_play(&request, &fingerprint).await? {
            return Ok(outcome);
        }

        match self.first_play(&request, &fingerprint).await {
            Ok(outcome) => Ok(outcome),
            Err(LedgerError::Storage(err)) if is_unique_violation(&err) => {
                // Lost a same-key race; the winner's round is committed now
                self.try_replay_play(&request, &fingerprint)
                    .await?
                    .ok_or(LedgerError::Storage(err))
            }
            Err(other) => Err(other),
        }
    }

    /// Resolve a round, crediting any win
    ///
    /// Requires the round to be `OPEN`. Calling `complete` on an
    /// already-completed round is idempotent and returns the original
    /// completion result without re-crediting. A zero win is recorded as a
    /// zero-amount `WIN` transaction; the balance is unaffected.
    ///
    /// # Arguments
    ///
    /// * `request` - Complete request with the resolved win amount
    ///
    /// # Returns
    ///
    /// * `LedgerResult<CompleteOutcome>` - Status, win transaction id, and
    ///   resulting balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::RoundNotFound` - Unknown round, or player/game
    ///   mismatch
    /// * `LedgerError::InvalidRoundState` - Round already rolled back
    pub async fn complete(&self, request: CompleteRequest) -> LedgerResult<CompleteOutcome> {
        if request.win < 0 {
            return Err(LedgerError::InvalidAmount(request.win));
        }

        let mut tx = self.pool.begin().await?;

        let round = self
            .fetch_round_for_update(&mut tx, request.round_id)
            .await?
            .ok_or(LedgerError::RoundNotFound(request.round_id))?;

        if round.player_id != request.player_id || round.game_id != request.game_id {
            return Err(LedgerError::RoundNotFound(request.round_id));
        }

        match round.status {
            RoundStatus::Completed => {
                // Pure replay: the stored round is authoritative
                let win_transaction_id = round
                    .win_transaction_id
                    .ok_or(LedgerError::Storage(sqlx::Error::RowNotFound))?;
                let balance = self
                    .transaction_balance_after(&mut tx, win_transaction_id)
                    .await?;
                Ok(CompleteOutcome {
                    round_id: round.round_id,
                    status: RoundStatus::Completed,
                    win_transaction_id,
                    balance,
                })
            }
            RoundStatus::RolledBack => {
                log::warn!(
                    "Rejected complete of rolled-back round {}",
                    round.round_id
                );
                Err(LedgerError::InvalidRoundState {
                    round_id: round.round_id,
                    status: round.status.to_string(),
                })
            }
            RoundStatus::Open => {
                let (win_transaction_id, balance) = match round.win_transaction_id {
                    // Win already credited while the round was open; do not
                    // credit twice, just finish the transition.
                    Some(existing) => {
                        let balance = self.account_balance(&mut tx, round.account_id).await?;
                        (existing, balance)
                    }
                    None => {
                        let balance = self
                            .credit_account(&mut tx, round.account_id, request.win)
                            .await?;
                        let id = self
                            .create_transaction(
                                &mut tx,
                                round.account_id,
                                Some(round.round_id),
                                TransactionType::Win,
                                request.win,
                                balance,
                                format!("complete_{}", round.round_id),
                            )
                            .await?;
                        (id, balance)
                    }
                };

                let win = round.win.unwrap_or(request.win);
                sqlx::query(
                    "UPDATE rounds
                     SET status = $1, win = $2, win_transaction_id = $3, completed_at = NOW()
                     WHERE round_id = $4",
                )
                .bind(RoundStatus::Completed.to_string())
                .bind(win)
                .bind(win_transaction_id)
                .bind(round.round_id)
                .execute(&mut *tx)
                .await?;

                self.record_event(
                    &mut tx,
                    round.round_id,
                    EventType::Complete,
                    json!({
                        "win": win,
                        "win_transaction_id": win_transaction_id,
                        "balance_after": balance,
                    }),
                )
                .await?;

                tx.commit().await?;

                Ok(CompleteOutcome {
                    round_id: round.round_id,
                    status: RoundStatus::Completed,
                    win_transaction_id,
                    balance,
                })
            }
        }
    }

    /// Void an in-flight round, reversing its monetary effects
    ///
    /// Requires the round to be `OPEN`, or the supplied key to match a
    /// previously recorded rollback of this round (pure replay). Reverses
    /// the `BET` debit with a `ROLLBACK_BET` credit; if a `WIN` had already
    /// been credited, it is reversed too with a `ROLLBACK_WIN` debit, which
    /// posts even if it drives the balance negative. Completed rounds are
    /// not reversible via this path.
    ///
    /// # Arguments
    ///
    /// * `request` - Rollback request
    ///
    /// # Returns
    ///
    /// * `LedgerResult<RollbackOutcome>` - Status, reversal transaction ids,
    ///   and resulting balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::RoundNotFound` - Unknown round or player mismatch
    /// * `LedgerError::InvalidRoundState` - Round already completed, or
    ///   rolled back under a different key
    /// * `LedgerError::IdempotencyConflict` - Key already used to roll back
    ///   a different round
    pub async fn rollback(&self, request: RollbackRequest) -> LedgerResult<RollbackOutcome> {
        if request.idempotency_key.is_empty() {
            return Err(LedgerError::MissingIdempotencyKey);
        }

        let mut tx = self.pool.begin().await?;

        let round = self
            .fetch_round_for_update(&mut tx, request.round_id)
            .await?
            .ok_or(LedgerError::RoundNotFound(request.round_id))?;

        if let Some(recorded_key) = &round.rollback_key {
            if *recorded_key == request.idempotency_key {
                let recorded = rollback_fingerprint(round.round_id, &round.player_id);
                if recorded != request.fingerprint() {
                    log::warn!(
                        "Rollback key {} reused with a different payload",
                        request.idempotency_key
                    );
                    return Err(LedgerError::IdempotencyConflict(request.idempotency_key));
                }
                // Pure replay: reconstruct the original result, mutate nothing
                let reversals = self.round_reversals(&mut tx, round.round_id).await?;
                let balance = reversals
                    .last()
                    .map(|t| t.balance_after)
                    .ok_or(LedgerError::Storage(sqlx::Error::RowNotFound))?;
                return Ok(RollbackOutcome {
                    round_id: round.round_id,
                    status: RoundStatus::RolledBack,
                    reversal_transaction_ids: reversals.iter().map(|t| t.id).collect(),
                    balance,
                });
            }
            if round.player_id != request.player_id {
                return Err(LedgerError::RoundNotFound(request.round_id));
            }
            log::warn!(
                "Rejected rollback of round {} under a fresh key after prior rollback",
                round.round_id
            );
            return Err(LedgerError::InvalidRoundState {
                round_id: round.round_id,
                status: round.status.to_string(),
            });
        }

        if round.player_id != request.player_id {
            return Err(LedgerError::RoundNotFound(request.round_id));
        }

        if round.status.is_terminal() {
            log::warn!(
                "Rejected rollback of {} round {}",
                round.status,
                round.round_id
            );
            return Err(LedgerError::InvalidRoundState {
                round_id: round.round_id,
                status: round.status.to_string(),
            });
        }

        match self.first_rollback(&mut tx, &round, &request).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(LedgerError::Storage(err)) if is_unique_violation(&err) => {
                // The key already rolled back a different round
                Err(LedgerError::IdempotencyConflict(request.idempotency_key))
            }
            Err(other) => Err(other),
        }
    }

    /// Get an account by its (operator, player, currency) key
    pub async fn account(
        &self,
        operator_id: &str,
        player_id: &str,
        currency: &str,
    ) -> LedgerResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, operator_id, player_id, currency, balance, created_at, updated_at
            FROM accounts
            WHERE operator_id = $1 AND player_id = $2 AND currency = $3
            "#,
        )
        .bind(operator_id)
        .bind(player_id)
        .bind(currency)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound {
            player_id: player_id.to_string(),
            currency: currency.to_string(),
        })?;

        account_from_row(&row)
    }

    /// Get a round by id
    pub async fn round(&self, round_id: Uuid) -> LedgerResult<Round> {
        let row = sqlx::query(&format!("{ROUND_COLUMNS} WHERE round_id = $1"))
            .bind(round_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::RoundNotFound(round_id))?;

        round_from_row(&row)
    }

    /// Get the committed transactions for a round, in commit order
    pub async fn round_transactions(
        &self,
        round_id: Uuid,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, round_id, entry_type, amount, balance_after,
                   idempotency_key, created_at
            FROM ledger_transactions
            WHERE round_id = $1
            ORDER BY id
            "#,
        )
        .bind(round_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    /// Get the audit trail for a round, in commit order
    pub async fn round_events(&self, round_id: Uuid, limit: i64) -> LedgerResult<Vec<RoundEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, round_id, event_type, payload, created_at
            FROM round_events
            WHERE round_id = $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(round_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let events = rows
            .into_iter()
            .map(|row| RoundEvent {
                id: row.get("id"),
                round_id: row.get("round_id"),
                event_type: row.get("event_type"),
                payload: row.get("payload"),
                created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect();

        Ok(events)
    }

    /// First execution of a play request: debit, round, transaction, event.
    async fn first_play(
        &self,
        request: &PlayRequest,
        fingerprint: &str,
    ) -> LedgerResult<PlayOutcome> {
        let mut tx = self.pool.begin().await?;

        let account = self
            .ensure_account(
                &mut tx,
                &request.operator_id,
                &request.player_id,
                &request.currency,
            )
            .await?;

        // Atomically debit with balance check; fails before any round or
        // transaction row exists
        let debited = sqlx::query(
            "UPDATE accounts
             SET balance = balance - $1, updated_at = NOW()
             WHERE id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(request.wager)
        .bind(account.id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance: i64 = match debited {
            Some(row) => row.get("balance"),
            None => {
                let row = sqlx::query("SELECT balance FROM accounts WHERE id = $1")
                    .bind(account.id)
                    .fetch_one(&mut *tx)
                    .await?;
                return Err(LedgerError::InsufficientFunds {
                    available: row.get("balance"),
                    required: request.wager,
                });
            }
        };

        // Reserving the play key and inserting the round are the same write;
        // a concurrent duplicate dies here on the unique constraint
        let round_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO rounds (round_id, account_id, player_id, game_id, wager, status,
                                play_key, play_fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(round_id)
        .bind(account.id)
        .bind(&request.player_id)
        .bind(&request.game_id)
        .bind(request.wager)
        .bind(RoundStatus::Open.to_string())
        .bind(&request.idempotency_key)
        .bind(fingerprint)
        .execute(&mut *tx)
        .await?;

        let bet_transaction_id = self
            .create_transaction(
                &mut tx,
                account.id,
                Some(round_id),
                TransactionType::Bet,
                request.wager,
                new_balance,
                request.idempotency_key.clone(),
            )
            .await?;

        sqlx::query("UPDATE rounds SET bet_transaction_id = $1 WHERE round_id = $2")
            .bind(bet_transaction_id)
            .bind(round_id)
            .execute(&mut *tx)
            .await?;

        self.record_event(
            &mut tx,
            round_id,
            EventType::Play,
            json!({
                "game_id": request.game_id,
                "wager": request.wager,
                "bet_transaction_id": bet_transaction_id,
                "balance_after": new_balance,
            }),
        )
        .await?;

        tx.commit().await?;

        Ok(PlayOutcome {
            round_id,
            bet_transaction_id,
            balance: new_balance,
        })
    }

    /// Look up a committed round under this play key and reconstruct the
    /// original result. Returns `Ok(None)` when the key is unseen.
    async fn try_replay_play(
        &self,
        request: &PlayRequest,
        fingerprint: &str,
    ) -> LedgerResult<Option<PlayOutcome>> {
        let row = sqlx::query(
            r#"
            SELECT r.round_id, r.play_fingerprint, t.id AS bet_transaction_id, t.balance_after
            FROM rounds r
            JOIN ledger_transactions t ON t.id = r.bet_transaction_id
            WHERE r.play_key = $1
            "#,
        )
        .bind(&request.idempotency_key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let recorded: String = row.get("play_fingerprint");
        if recorded != fingerprint {
            log::warn!(
                "Play key {} reused with a different payload",
                request.idempotency_key
            );
            return Err(LedgerError::IdempotencyConflict(
                request.idempotency_key.clone(),
            ));
        }

        Ok(Some(PlayOutcome {
            round_id: row.get("round_id"),
            bet_transaction_id: row.get("bet_transaction_id"),
            balance: row.get("balance_after"),
        }))
    }

    /// First execution of a rollback: reverse the bet (and any credited win),
    /// transition the round, record the event. Runs inside the caller's unit.
    async fn first_rollback(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        round: &Round,
        request: &RollbackRequest,
    ) -> LedgerResult<RollbackOutcome> {
        let mut balance = self
            .credit_account(tx, round.account_id, round.wager)
            .await?;

        let rollback_bet_id = self
            .create_transaction(
                tx,
                round.account_id,
                Some(round.round_id),
                TransactionType::RollbackBet,
                round.wager,
                balance,
                request.idempotency_key.clone(),
            )
            .await?;
        let mut reversal_transaction_ids = vec![rollback_bet_id];

        if let Some(win_transaction_id) = round.win_transaction_id {
            // A win was credited before the rollback arrived; reverse it at
            // its recorded magnitude. No funds guard: the reversal must post
            // even if the player already spent the win.
            let win_amount = self
                .transaction_amount(tx, win_transaction_id)
                .await?;
            balance = self
                .debit_account_unchecked(tx, round.account_id, win_amount)
                .await?;
            let rollback_win_id = self
                .create_transaction(
                    tx,
                    round.account_id,
                    Some(round.round_id),
                    TransactionType::RollbackWin,
                    win_amount,
                    balance,
                    request.idempotency_key.clone(),
                )
                .await?;
            reversal_transaction_ids.push(rollback_win_id);
        }

        sqlx::query(
            "UPDATE rounds
             SET status = $1, rollback_key = $2, rolled_back_at = NOW()
             WHERE round_id = $3",
        )
        .bind(RoundStatus::RolledBack.to_string())
        .bind(&request.idempotency_key)
        .bind(round.round_id)
        .execute(&mut **tx)
        .await?;

        self.record_event(
            tx,
            round.round_id,
            EventType::Rollback,
            json!({
                "reversal_transaction_ids": reversal_transaction_ids,
                "balance_after": balance,
            }),
        )
        .await?;

        Ok(RollbackOutcome {
            round_id: round.round_id,
            status: RoundStatus::RolledBack,
            reversal_transaction_ids,
            balance,
        })
    }

    /// Insert the account row if this is the first sight of the triple,
    /// applying the opening grant, then return the current row.
    async fn ensure_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operator_id: &str,
        player_id: &str,
        currency: &str,
    ) -> LedgerResult<Account> {
        let inserted = sqlx::query(
            "INSERT INTO accounts (operator_id, player_id, currency, balance)
             VALUES ($1, $2, $3, 0)
             ON CONFLICT (operator_id, player_id, currency) DO NOTHING
             RETURNING id",
        )
        .bind(operator_id)
        .bind(player_id)
        .bind(currency)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = inserted {
            let account_id: AccountId = row.get("id");
            if self.opening_grant > 0 {
                sqlx::query(
                    "UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(self.opening_grant)
                .bind(account_id)
                .execute(&mut **tx)
                .await?;

                self.create_transaction(
                    tx,
                    account_id,
                    None,
                    TransactionType::Deposit,
                    self.opening_grant,
                    self.opening_grant,
                    format!("deposit_{account_id}"),
                )
                .await?;
            }
            log::info!("Provisioned account {account_id} for player {player_id} ({currency})");
        }

        let row = sqlx::query(
            r#"
            SELECT id, operator_id, player_id, currency, balance, created_at, updated_at
            FROM accounts
            WHERE operator_id = $1 AND player_id = $2 AND currency = $3
            "#,
        )
        .bind(operator_id)
        .bind(player_id)
        .bind(currency)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound {
            player_id: player_id.to_string(),
            currency: currency.to_string(),
        })?;

        account_from_row(&row)
    }

    /// Credit an account with overflow protection, returning the new balance.
    async fn credit_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        amount: i64,
    ) -> LedgerResult<i64> {
        let current = self.account_balance(tx, account_id).await?;
        let new_balance = current
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(account_id)
            .execute(&mut **tx)
            .await?;

        Ok(new_balance)
    }

    /// Debit an account without the insufficient-funds guard (mandated
    /// reversals only), returning the new balance.
    async fn debit_account_unchecked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        amount: i64,
    ) -> LedgerResult<i64> {
        let current = self.account_balance(tx, account_id).await?;
        let new_balance = current
            .checked_sub(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(account_id)
            .execute(&mut **tx)
            .await?;

        Ok(new_balance)
    }

    /// Read an account balance under a row lock.
    async fn account_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
    ) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.get("balance"))
    }

    /// Append a committed monetary movement (immutable once written)
    async fn create_transaction(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        round_id: Option<Uuid>,
        entry_type: TransactionType,
        amount: i64,
        balance_after: i64,
        idempotency_key: String,
    ) -> LedgerResult<TransactionId> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_transactions (account_id, round_id, entry_type, amount,
                                             balance_after, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(round_id)
        .bind(entry_type.to_string())
        .bind(amount)
        .bind(balance_after)
        .bind(idempotency_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    /// Append an audit event within the caller's open unit of work
    async fn record_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        round_id: Uuid,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> LedgerResult<()> {
        sqlx::query("INSERT INTO round_events (round_id, event_type, payload) VALUES ($1, $2, $3)")
            .bind(round_id)
            .bind(event_type.to_string())
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Fetch a round under a row lock.
    async fn fetch_round_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        round_id: Uuid,
    ) -> LedgerResult<Option<Round>> {
        let row = sqlx::query(&format!("{ROUND_COLUMNS} WHERE round_id = $1 FOR UPDATE"))
            .bind(round_id)
            .fetch_optional(&mut **tx)
            .await?;

        row.as_ref().map(round_from_row).transpose()
    }

    /// Reversal transactions for a round, in commit order.
    async fn round_reversals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        round_id: Uuid,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, round_id, entry_type, amount, balance_after,
                   idempotency_key, created_at
            FROM ledger_transactions
            WHERE round_id = $1 AND entry_type IN ('ROLLBACK_BET', 'ROLLBACK_WIN')
            ORDER BY id
            "#,
        )
        .bind(round_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn transaction_balance_after(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: TransactionId,
    ) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance_after FROM ledger_transactions WHERE id = $1")
            .bind(transaction_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.get("balance_after"))
    }

    async fn transaction_amount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: TransactionId,
    ) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT amount FROM ledger_transactions WHERE id = $1")
            .bind(transaction_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.get("amount"))
    }
}

const ROUND_COLUMNS: &str = "SELECT round_id, account_id, player_id, game_id, wager, win, \
     status, play_key, play_fingerprint, rollback_key, bet_transaction_id, win_transaction_id, \
     created_at, completed_at, rolled_back_at FROM rounds";

fn account_from_row(row: &sqlx::postgres::PgRow) -> LedgerResult<Account> {
    Ok(Account {
        id: row.get("id"),
        operator_id: row.get("operator_id"),
        player_id: row.get("player_id"),
        currency: row.get("currency"),
        balance: row.get("balance"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    })
}

fn round_from_row(row: &sqlx::postgres::PgRow) -> LedgerResult<Round> {
    let status: String = row.get("status");
    Ok(Round {
        round_id: row.get("round_id"),
        account_id: row.get("account_id"),
        player_id: row.get("player_id"),
        game_id: row.get("game_id"),
        wager: row.get("wager"),
        win: row.get("win"),
        status: parse_column(&status, "status", RoundStatus::parse)?,
        play_key: row.get("play_key"),
        play_fingerprint: row.get("play_fingerprint"),
        rollback_key: row.get("rollback_key"),
        bet_transaction_id: row.get("bet_transaction_id"),
        win_transaction_id: row.get("win_transaction_id"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        completed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("completed_at")
            .map(|dt| dt.and_utc()),
        rolled_back_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("rolled_back_at")
            .map(|dt| dt.and_utc()),
    })
}

fn transaction_from_row(row: &sqlx::postgres::PgRow) -> LedgerResult<LedgerTransaction> {
    let entry_type: String = row.get("entry_type");
    Ok(LedgerTransaction {
        id: row.get("id"),
        account_id: row.get("account_id"),
        round_id: row.get("round_id"),
        entry_type: parse_column(&entry_type, "entry_type", TransactionType::parse)?,
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        idempotency_key: row.get("idempotency_key"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn parse_column<T>(
    raw: &str,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> LedgerResult<T> {
    parse(raw).ok_or_else(|| {
        LedgerError::Storage(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: format!("unrecognized {column} value: {raw}").into(),
        })
    })
}

/// Postgres SQLSTATE 23505: a uniqueness constraint fired.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
