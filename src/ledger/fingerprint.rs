//! Request fingerprinting for idempotency-key validation.
//!
//! A fingerprint is a hash of the semantically relevant request fields. When
//! a key is seen again, a matching fingerprint means replay; a mismatched
//! fingerprint means the caller reused the key for a different request,
//! which is a caller bug and must never silently proceed.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::models::{PlayRequest, RollbackRequest};

fn digest(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fields.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint for a play request: operator, player, game, wager, currency.
pub fn play_fingerprint(request: &PlayRequest) -> String {
    digest(&[
        "play",
        &request.operator_id,
        &request.player_id,
        &request.game_id,
        &request.wager.to_string(),
        &request.currency,
    ])
}

/// Fingerprint for a rollback request: round and player.
pub fn rollback_fingerprint(round_id: Uuid, player_id: &str) -> String {
    digest(&["rollback", &round_id.to_string(), player_id])
}

impl RollbackRequest {
    /// Fingerprint of this request's semantically relevant fields.
    pub fn fingerprint(&self) -> String {
        rollback_fingerprint(self.round_id, &self.player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_request(wager: i64) -> PlayRequest {
        PlayRequest {
            operator_id: "op1".to_string(),
            player_id: "p1".to_string(),
            game_id: "scratch-7s".to_string(),
            currency: "EUR".to_string(),
            wager,
            idempotency_key: "k1".to_string(),
        }
    }

    #[test]
    fn test_identical_requests_share_a_fingerprint() {
        assert_eq!(
            play_fingerprint(&play_request(200)),
            play_fingerprint(&play_request(200))
        );
    }

    #[test]
    fn test_fingerprint_ignores_the_key_itself() {
        let mut request = play_request(200);
        request.idempotency_key = "another-key".to_string();
        assert_eq!(
            play_fingerprint(&request),
            play_fingerprint(&play_request(200))
        );
    }

    #[test]
    fn test_payload_change_changes_fingerprint() {
        assert_ne!(
            play_fingerprint(&play_request(200)),
            play_fingerprint(&play_request(500))
        );

        let mut request = play_request(200);
        request.game_id = "scratch-8s".to_string();
        assert_ne!(
            play_fingerprint(&request),
            play_fingerprint(&play_request(200))
        );
    }

    #[test]
    fn test_rollback_fingerprint_binds_round_and_player() {
        let round_a = Uuid::new_v4();
        let round_b = Uuid::new_v4();
        assert_eq!(
            rollback_fingerprint(round_a, "p1"),
            rollback_fingerprint(round_a, "p1")
        );
        assert_ne!(
            rollback_fingerprint(round_a, "p1"),
            rollback_fingerprint(round_b, "p1")
        );
        assert_ne!(
            rollback_fingerprint(round_a, "p1"),
            rollback_fingerprint(round_a, "p2")
        );
    }

    #[test]
    fn test_field_concatenation_is_not_ambiguous() {
        // "ab|c" vs "a|bc" style collisions across the separator
        let mut left = play_request(200);
        left.operator_id = "op".to_string();
        left.player_id = "1p1".to_string();
        let right = play_request(200);
        assert_ne!(play_fingerprint(&left), play_fingerprint(&right));
    }
}
