use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fastore_core::{create_store, Context};

fastore_core::state! {
    pub struct Grid / GridPatch {
        pub cells: Vec<u32>,
        pub cursor: usize,
    }
}

fn bench_set_with_bindings(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_fanout");

    for bindings in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(bindings), &bindings, |b, &n| {
            let family = create_store(
                Grid {
                    cells: vec![0; n],
                    cursor: 0,
                },
                None,
            );
            let scope = family.activate().unwrap();
            let ctx = scope.provide(&Context::root());

            let observers: Vec<_> = (0..n)
                .map(|i| family.use_selector(&ctx, move |g: &Grid| g.cells[i]).unwrap())
                .collect();

            let mut cursor = 0;
            b.iter(|| {
                cursor += 1;
                scope
                    .engine()
                    .set(GridPatch::default().cursor(black_box(cursor)))
                    .unwrap();
            });

            black_box(observers.len());
        });
    }

    group.finish();
}

fn bench_selector_read(c: &mut Criterion) {
    let family = create_store(
        Grid {
            cells: vec![7; 64],
            cursor: 0,
        },
        None,
    );
    let scope = family.activate().unwrap();
    let ctx = scope.provide(&Context::root());
    let binding = family.use_selector(&ctx, |g: &Grid| g.cells[3]).unwrap();

    c.bench_function("binding_get", |b| b.iter(|| black_box(binding.get())));
}

criterion_group!(benches, bench_set_with_bindings, bench_selector_read);
criterion_main!(benches);
