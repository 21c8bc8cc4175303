//! Roll derivation, payout math and in-memory settlement throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fairdice::config::GameConfig;
use fairdice::games::{payout, roll_engine, BetRequest, DiceCasino, Direction, Hundredths, NoopNotifier};
use fairdice::metrics::MetricsRegistry;
use fairdice::MemoryStore;
use std::sync::Arc;

fn bench_roll(c: &mut Criterion) {
    let mut group = c.benchmark_group("roll");
    let server_seed = "a".repeat(64);

    group.bench_function("hmac_and_roll", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce += 1;
            black_box(roll_engine::roll(&server_seed, "bench-client", nonce))
        })
    });

    let digest = roll_engine::hmac_hex(&server_seed, "bench-client", 1);
    group.bench_function("roll_from_digest", |b| {
        b.iter(|| black_box(roll_engine::roll_from_digest(black_box(&digest))))
    });

    for len in [16usize, 64, 256] {
        let client_seed = "c".repeat(len);
        group.bench_with_input(BenchmarkId::new("client_seed_len", len), &client_seed, |b, seed| {
            b.iter(|| black_box(roll_engine::hmac_hex(&server_seed, seed, 42)))
        });
    }

    group.finish();
}

fn bench_payout(c: &mut Criterion) {
    c.bench_function("payout/settle_win", |b| {
        b.iter(|| {
            let chance = payout::win_chance(Direction::Over, Hundredths::from_raw(black_box(5_000)));
            let multiplier = payout::payout_multiplier(chance, 0.01).unwrap_or_default();
            black_box(payout::settle(1_000, multiplier, true))
        })
    });
}

fn bench_settlement(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut config = GameConfig::default();
    config.starting_balance = 1_000_000_000_000;
    let casino = DiceCasino::new(Arc::new(MemoryStore::new()), config, Arc::new(NoopNotifier), MetricsRegistry::new());
    let account = runtime
        .block_on(casino.seeds().create_account("bencher"))
        .unwrap();

    c.bench_function("settlement/memory_store", |b| {
        b.iter(|| {
            let request = BetRequest::manual(1, Hundredths::from_raw(5_000), Direction::Under);
            black_box(runtime.block_on(casino.settlement().settle(account.account_id, request)).unwrap())
        })
    });
}

criterion_group!(benches, bench_roll, bench_payout, bench_settlement);
criterion_main!(benches);
