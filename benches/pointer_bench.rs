use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ownptr::{
    make_intrusive, make_shared, make_unique, BoxDestroy, Counter, IntrusiveOwnable, SharedPtr,
    UniquePtr,
};
use std::rc::Rc;
use std::time::Duration;

struct Node {
    refs: Counter,
    value: u64,
}

unsafe impl IntrusiveOwnable for Node {
    type Counter = Counter;
    type Policy = BoxDestroy;

    fn counter(&self) -> &Counter {
        &self.refs
    }
}

fn bench_create(c: &mut Criterion) {
    c.bench_function("make_shared_u64", |b| {
        b.iter(|| black_box(make_shared(black_box(7u64))))
    });
    c.bench_function("shared_from_box_u64", |b| {
        b.iter(|| black_box(SharedPtr::from_box(Box::new(black_box(7u64)))))
    });
    c.bench_function("rc_new_u64", |b| b.iter(|| black_box(Rc::new(black_box(7u64)))));
    c.bench_function("make_unique_u64", |b| {
        b.iter(|| black_box(make_unique(black_box(7u64))))
    });
}

fn bench_clone_drop(c: &mut Criterion) {
    c.bench_function("intrusive_clone_drop", |b| {
        let p = make_intrusive(Node {
            refs: Counter::new(0),
            value: 1,
        });
        b.iter(|| {
            let x = p.clone();
            black_box(x.value);
            drop(x);
        })
    });
    c.bench_function("shared_clone_drop", |b| {
        let p = make_shared(1u64);
        b.iter(|| {
            let x = p.clone();
            black_box(&x);
            drop(x);
        })
    });
    c.bench_function("weak_lock_drop", |b| {
        let p = make_shared(1u64);
        let w = p.downgrade();
        b.iter(|| {
            let x = w.lock();
            black_box(&x);
            drop(x);
        })
    });
}

fn bench_teardown(c: &mut Criterion) {
    c.bench_function("shared_drop_10k_with_weak", |b| {
        b.iter_batched(
            || {
                let strong: Vec<_> = (0..10_000u64).map(make_shared).collect();
                let weak: Vec<_> = strong.iter().map(SharedPtr::downgrade).collect();
                (strong, weak)
            },
            |(strong, weak)| {
                drop(strong);
                black_box(weak.iter().filter(|w| w.expired()).count())
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("unique_reset_10k", |b| {
        b.iter_batched(
            || UniquePtr::new(0u64),
            |mut p| {
                for i in 0..10_000u64 {
                    p.reset_with(Box::new(i));
                }
                black_box(p)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_create, bench_clone_drop, bench_teardown
}
criterion_main!(benches);
