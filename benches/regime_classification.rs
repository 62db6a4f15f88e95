use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use organism_trainer::adapters::ScriptedOrganism;
use organism_trainer::domain::models::training::{
    classify_regime, classify_regime_with_wave, evolve_tau, AppetitivePhase, Regime,
    TauEvolutionRequest, WaveContext,
};
use organism_trainer::domain::ports::OrganismResponse;
use organism_trainer::services::{MultiIterationTrainer, TrainerConfig};

fn rising_history(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 + 0.25 * (i as f64 / len as f64) + 0.01 * ((i % 3) as f64 - 1.0))
        .collect()
}

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("regime_classification");
    for len in [5usize, 20, 100] {
        let history = rising_history(len);
        group.bench_function(format!("classify_{len}"), |b| {
            b.iter(|| criterion::black_box(classify_regime(&history, history.len())));
        });
    }

    let history = rising_history(20);
    let wave = WaveContext {
        phases: vec![Some(AppetitivePhase::Concrescence); 20],
        spatial_variance: vec![0.002; 20],
        field_coherence: vec![0.82; 20],
    };
    group.bench_function("classify_with_wave_20", |b| {
        b.iter(|| {
            criterion::black_box(classify_regime_with_wave(&history, history.len(), &wave))
        });
    });

    let request = TauEvolutionRequest::new(0.5, 0.85, 0.75, Regime::Stable)
        .with_phase(AppetitivePhase::Concrescence)
        .with_spatial_variance(0.007)
        .with_field_coherence(0.55);
    group.bench_function("evolve_tau", |b| {
        b.iter(|| criterion::black_box(evolve_tau(&request)));
    });
    group.finish();
}

fn bench_pair_training(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime should build");

    c.bench_function("train_single_pair_max_10", |b| {
        b.iter_batched(
            || {
                let organism = ScriptedOrganism::constant(
                    OrganismResponse::new(0.6, 0.8, 4, 0.7).with_field_coherence(0.6),
                );
                let config = TrainerConfig {
                    max_iterations: 10,
                    ..TrainerConfig::default()
                };
                MultiIterationTrainer::new(Arc::new(organism), config)
            },
            |trainer| {
                let result = runtime.block_on(trainer.train_single_pair("bench", "input"));
                criterion::black_box(result)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_classification, bench_pair_training);
criterion_main!(benches);
