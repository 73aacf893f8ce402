use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fiber_core::{Element, Node};
use fiber_testing::TestRenderer;

const ROW_COUNT_SAMPLES: &[usize] = &[64, 256, 1024];

fn rows(count: usize, reversed: bool) -> Element {
    let order: Box<dyn Iterator<Item = usize>> = if reversed {
        Box::new((0..count).rev())
    } else {
        Box::new(0..count)
    };
    Element::host("ul")
        .children(order.map(|row| {
            Element::host("li")
                .key(row.to_string())
                .attr("index", row)
                .child(format!("Row {row}"))
                .into()
        }))
        .build()
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_mount");
    for &count in ROW_COUNT_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            b.iter(|| {
                let mut renderer = TestRenderer::new();
                renderer.render(rows(count, false)).expect("mount");
                black_box(renderer.container_children());
            });
        });
    }
    group.finish();
}

fn bench_keyed_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_keyed_reorder");
    for &count in ROW_COUNT_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            let mut renderer = TestRenderer::new();
            renderer.render(rows(count, false)).expect("mount");
            let mut reversed = false;

            b.iter(|| {
                reversed = !reversed;
                renderer.render(rows(count, reversed)).expect("reorder");
                black_box(renderer.host_mut().take_ops());
            });
        });
    }
    group.finish();
}

fn bench_unchanged_update(c: &mut Criterion) {
    let mut renderer = TestRenderer::new();
    let tree = rows(256, false);
    renderer.render(tree.clone()).expect("mount");

    // The same element again lets the whole tree bail out.
    c.bench_function("reconcile_unchanged", |b| {
        b.iter(|| {
            renderer.render(Node::from(tree.clone())).expect("update");
            black_box(renderer.host_mut().take_ops());
        });
    });
}

criterion_group!(reconcile, bench_mount, bench_keyed_reorder, bench_unchanged_update);
criterion_main!(reconcile);
