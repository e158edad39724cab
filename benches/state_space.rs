//! Explicit vs symbolic reachability on dining philosophers.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pnreach::analysis::explore_with_depth;
use pnreach::detector::deadlock::symbolic_or_fallback_deadlock;
use pnreach::net::{Net, Place, PlaceId, Transition};
use pnreach::symbolic::symbolic_reachability;

fn philosophers(n: usize) -> Net {
    let mut net = Net::named(format!("philosophers{n}"));
    let forks: Vec<PlaceId> = (0..n)
        .map(|i| net.add_place(Place::new(format!("fork{i}"), 1)))
        .collect();
    for i in 0..n {
        let thinking = net.add_place(Place::new(format!("think{i}"), 1));
        let holding = net.add_place(Place::new(format!("hold{i}"), 0));
        let eating = net.add_place(Place::new(format!("eat{i}"), 0));
        let (left, right) = (forks[i], forks[(i + 1) % n]);

        let take_left = net.add_transition(Transition::new(format!("take_left{i}")));
        net.add_input_arc(thinking, take_left, 1);
        net.add_input_arc(left, take_left, 1);
        net.add_output_arc(holding, take_left, 1);

        let take_right = net.add_transition(Transition::new(format!("take_right{i}")));
        net.add_input_arc(holding, take_right, 1);
        net.add_input_arc(right, take_right, 1);
        net.add_output_arc(eating, take_right, 1);

        let release = net.add_transition(Transition::new(format!("release{i}")));
        net.add_input_arc(eating, release, 1);
        net.add_output_arc(thinking, release, 1);
        net.add_output_arc(left, release, 1);
        net.add_output_arc(right, release, 1);
    }
    net
}

fn bench_reachability(c: &mut Criterion) {
    let mut group = c.benchmark_group("reachability");
    for n in [3, 5, 7] {
        let net = philosophers(n);
        group.bench_with_input(BenchmarkId::new("explicit", n), &net, |b, net| {
            b.iter(|| explore_with_depth(black_box(net)).len())
        });
        group.bench_with_input(BenchmarkId::new("symbolic", n), &net, |b, net| {
            b.iter(|| symbolic_reachability(black_box(net), None).map(|r| r.node_count))
        });
    }
    group.finish();
}

fn bench_deadlock(c: &mut Criterion) {
    let net = philosophers(5);
    c.bench_function("deadlock/philosophers5", |b| {
        b.iter(|| symbolic_or_fallback_deadlock(black_box(&net), 10).map(|r| r.witness_count))
    });
}

criterion_group!(state_space, bench_reachability, bench_deadlock);
criterion_main!(state_space);
