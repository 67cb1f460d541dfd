//! Benchmarks for progress channel publishing and fan-out.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::StreamExt;
use launchpad::core::{MonotonicCounter, ProgressEvent, RunId, RunOutcome, RunSummary, Stage};
use launchpad::progress::{ChannelConfig, ProgressChannel};
use launchpad::repository::RepositoryKey;
use std::sync::Arc;

const EVENTS: usize = 200;

fn channel() -> ProgressChannel {
    let config = ChannelConfig {
        replay_capacity: 256,
        subscriber_queue: EVENTS + 1,
    };
    ProgressChannel::new(RunId::new(1), Arc::new(MonotonicCounter::new()), config)
}

fn summary() -> RunSummary {
    RunSummary {
        run_id: RunId::new(1),
        repository: RepositoryKey::new("acme", "widgets", "main"),
        outcome: RunOutcome::Completed,
        steps: Vec::new(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
    }
}

fn publish_benchmark(c: &mut Criterion) {
    c.bench_function("publish_without_subscribers", |b| {
        b.iter(|| {
            let channel = channel();
            for i in 0..EVENTS {
                black_box(channel.publish(ProgressEvent::info(Stage::Build, format!("step {i}"))));
            }
        });
    });
}

fn fan_out_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("publish_and_drain");
    for subscribers in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, &n| {
            b.to_async(&rt).iter(|| async move {
                let channel = channel();
                let subs: Vec<_> = (0..n).map(|_| channel.subscribe()).collect();
                for i in 0..EVENTS {
                    channel.publish(ProgressEvent::info(Stage::Build, format!("step {i}")));
                }
                channel.publish(ProgressEvent::close(Stage::Build, summary()));
                for sub in subs {
                    black_box(sub.collect::<Vec<_>>().await);
                }
            });
        });
    }
    group.finish();
}

fn replay_benchmark(c: &mut Criterion) {
    let channel = channel();
    for i in 0..EVENTS {
        channel.publish(ProgressEvent::info(Stage::Fetch, format!("step {i}")));
    }
    channel.publish(ProgressEvent::close(Stage::Fetch, summary()));
    c.bench_function("late_subscribe_replay", |b| {
        b.iter(|| black_box(channel.subscribe_after(Some(100))));
    });
}

criterion_group!(benches, publish_benchmark, fan_out_benchmark, replay_benchmark);
criterion_main!(benches);
