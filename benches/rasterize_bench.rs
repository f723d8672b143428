#![deny(warnings)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scanblend::*;
use std::{f64::consts::PI, hint::black_box, time::Duration};

/// Star polygon with many self intersecting edges
fn star(center: Point, radius: Scalar, points: usize) -> Path {
    let mut builder = Path::builder();
    let step = PI * (points / 2 - 1) as Scalar / points as Scalar * 2.0;
    for index in 0..points {
        let angle = step * index as Scalar;
        let p = Point::new(
            center.x() + radius * angle.cos(),
            center.y() + radius * angle.sin(),
        );
        if index == 0 {
            builder.move_to(p);
        } else {
            builder.line_to(p);
        }
    }
    builder.close();
    builder.build()
}

/// Rasterize path and consume every tile
fn sweep(path: &Path, rule: FillRule, bounds: BBox, buffer: &mut [u8]) -> usize {
    let mut rasterizer = Rasterizer::acquire(bounds, rule);
    path.emit(&mut rasterizer);
    let Some(mut tiles) = rasterizer.end_rendering() else {
        return 0;
    };
    let stride = tiles.tile_width();
    while !tiles.is_done() {
        if tiles.typical_alpha() == tile::ALPHA_PARTIAL {
            tiles.fill_alpha(buffer, 0, stride);
        }
        tiles.advance();
    }
    let count = tiles.tiles();
    tiles.dispose();
    count
}

fn rasterize_benchmark(c: &mut Criterion) {
    let bounds = BBox::from_size(512, 512);
    let size = config().tile_size();
    let mut buffer = vec![0u8; size * size];
    let circle = Path::builder()
        .move_to((256.0, 256.0))
        .circle(200.0)
        .build();

    let mut group = c.benchmark_group("rasterize");
    group.throughput(Throughput::Elements(1));
    group.bench_function("circle", |b| {
        b.iter(|| sweep(black_box(&circle), FillRule::NonZero, bounds, &mut buffer))
    });
    for points in [11, 101, 1001] {
        let path = star(Point::new(256.0, 256.0), 250.0, points);
        for rule in [FillRule::NonZero, FillRule::EvenOdd] {
            let id = BenchmarkId::new(format!("star {:?}", rule), points);
            group.bench_with_input(id, &path, |b, path| {
                b.iter(|| sweep(path, rule, bounds, &mut buffer))
            });
        }
    }
    group.finish()
}

criterion_group!(
    name = rasterize;
    config = Criterion::default().sample_size(20).warm_up_time(Duration::new(1, 0));
    targets = rasterize_benchmark
);
criterion_main!(rasterize);
