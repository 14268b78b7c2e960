use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hierarchy_core::{HierarchyEngine, MemoryBackend};

fn chain(depth: usize) -> HierarchyEngine<MemoryBackend> {
    let mut engine = HierarchyEngine::new(MemoryBackend::new());
    engine.ensure_root().unwrap();
    let mut parent = "root".to_string();
    for i in 0..depth {
        let child = format!("n{i}");
        engine.add_child(&parent, &child).unwrap();
        parent = child;
    }
    engine
}

fn bench_add_child(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_child_chain");
    for depth in [10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| black_box(chain(depth)));
        });
    }
    group.finish();
}

fn bench_move_subtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_subtree");
    for depth in [10usize, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut engine = chain(depth);
            engine.add_child("root", "left").unwrap();
            engine.add_child("root", "right").unwrap();
            let mut flip = false;
            b.iter(|| {
                let target = if flip { "left" } else { "right" };
                flip = !flip;
                engine.move_subtree("n1", target).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_list_descendants(c: &mut Criterion) {
    let engine = chain(200);
    c.bench_function("list_descendants_root_200", |b| {
        b.iter(|| black_box(engine.list_descendants("root").unwrap()))
    });
}

criterion_group!(benches, bench_add_child, bench_move_subtree, bench_list_descendants);
criterion_main!(benches);
