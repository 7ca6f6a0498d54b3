use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rgs_ledger::ledger::{PlayRequest, RoundStatus, TransactionType, fingerprint};

fn sample_request(wager: i64) -> PlayRequest {
    PlayRequest {
        operator_id: "operator-eu-1".to_string(),
        player_id: "player-8842".to_string(),
        game_id: "scratch-lucky-7s".to_string(),
        currency: "EUR".to_string(),
        wager,
        idempotency_key: "bench-key".to_string(),
    }
}

/// Benchmark play-request fingerprinting (runs once per inbound request)
fn bench_play_fingerprint(c: &mut Criterion) {
    let request = sample_request(200);

    c.bench_function("play_fingerprint", |b| {
        b.iter(|| fingerprint::play_fingerprint(&request));
    });
}

/// Benchmark fingerprinting across wager magnitudes (field lengths vary)
fn bench_play_fingerprint_wagers(c: &mut Criterion) {
    let mut group = c.benchmark_group("play_fingerprint_wagers");
    for wager in [1i64, 10_000, 9_999_999_999] {
        let request = sample_request(wager);
        group.bench_with_input(BenchmarkId::from_parameter(wager), &request, |b, request| {
            b.iter(|| fingerprint::play_fingerprint(request));
        });
    }
    group.finish();
}

/// Benchmark the transition legality check (runs on every complete/rollback)
fn bench_transition_check(c: &mut Criterion) {
    let statuses = [
        RoundStatus::Open,
        RoundStatus::Completed,
        RoundStatus::RolledBack,
    ];

    c.bench_function("transition_check", |b| {
        b.iter(|| {
            let mut legal = 0u32;
            for from in statuses {
                for to in statuses {
                    if from.can_transition(to) {
                        legal += 1;
                    }
                }
            }
            legal
        });
    });
}

/// Benchmark the signed-delta convention over a synthetic round lifecycle
fn bench_signed_delta(c: &mut Criterion) {
    let entries = [
        (TransactionType::Deposit, 10_000i64),
        (TransactionType::Bet, 200),
        (TransactionType::Win, 350),
        (TransactionType::RollbackBet, 200),
        (TransactionType::RollbackWin, 350),
    ];

    c.bench_function("signed_delta_sum", |b| {
        b.iter(|| {
            entries
                .iter()
                .map(|&(entry_type, amount)| entry_type.signed_delta(amount))
                .sum::<i64>()
        });
    });
}

criterion_group!(
    benches,
    bench_play_fingerprint,
    bench_play_fingerprint_wagers,
    bench_transition_check,
    bench_signed_delta
);
criterion_main!(benches);
