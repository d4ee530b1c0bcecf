//! Micro-benchmarks: interpreter throughput and fingerprinting

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use penstock_core::testutil::{chained_demo_config, demo_environment, long_chain_config};
use penstock_core::{Engine, Mode};

fn bench_interpreter_chained(c: &mut Criterion) {
    let engine = Engine::new();
    let mut exec = engine
        .executor(chained_demo_config(), Mode::Interpreter)
        .expect("valid config");

    c.bench_function("interp_chained_demo", |b| {
        b.iter(|| {
            let mut env = demo_environment();
            exec.execute(black_box(&mut env)).expect("executes");
            env
        });
    });
}

fn bench_interpreter_long_chain(c: &mut Criterion) {
    let engine = Engine::new();
    let mut exec = engine
        .executor(long_chain_config(50), Mode::Interpreter)
        .expect("valid config");

    c.bench_function("interp_long_chain_50", |b| {
        b.iter(|| {
            let mut env = penstock_core::Environment::new();
            env.set("a", 1.0);
            env.set("b", 2.0);
            env.set("c", 1.5);
            exec.execute(black_box(&mut env)).expect("executes");
            env
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    c.bench_function("fingerprint_long_chain_50", |b| {
        b.iter(|| {
            let mut config = long_chain_config(50);
            config.compute_fingerprint().to_string()
        });
    });
}

criterion_group!(
    benches,
    bench_interpreter_chained,
    bench_interpreter_long_chain,
    bench_fingerprint
);
criterion_main!(benches);
