//! Benchmarks for surface normal estimation
//!
//! Compares the three estimators and the cost of building their caches.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cv_core::{back_project, AnyMat, CameraIntrinsics, DataType, Mat};
use cv_rgbd::{NormalsConfig, NormalsMethod, RgbdNormals};
use nalgebra::{Matrix3, Vector3};
use std::time::Duration;

/// Organized point cloud of a tilted plane about 1 m away.
fn create_plane_cloud(rows: usize, cols: usize, k: &Matrix3<f64>) -> Mat<f32> {
    let n = Vector3::new(0.2, -0.1, -0.97).normalize();
    Mat::from_fn(rows, cols, 3, |y, x, ch| {
        let ray = back_project(k, x as f64, y as f64, 1.0);
        let p = ray * (-1000.0 / n.dot(&ray));
        p[ch] as f32
    })
}

fn camera(rows: usize, cols: usize) -> Matrix3<f64> {
    CameraIntrinsics::new(525.0, 525.0, cols as f64 / 2.0, rows as f64 / 2.0).matrix()
}

const METHODS: [NormalsMethod; 3] = [
    NormalsMethod::Fals,
    NormalsMethod::Linemod,
    NormalsMethod::Sri,
];

fn benchmark_normals_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("normals_compute");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for (rows, cols) in [(240usize, 320usize), (480, 640)] {
        let k = camera(rows, cols);
        let cloud = AnyMat::from(create_plane_cloud(rows, cols, &k));

        for method in METHODS {
            let config = NormalsConfig::new(rows, cols, DataType::F32, k, 5, method);
            let mut normals = match RgbdNormals::new(config) {
                Ok(n) => n,
                Err(_) => continue,
            };
            let mut out = AnyMat::default();
            // Warm the cache so only compute is measured.
            let _ = normals.compute(&cloud, &mut out);

            group.bench_with_input(
                BenchmarkId::new(method.as_str(), format!("{}x{}", cols, rows)),
                &cloud,
                |b, input| {
                    b.iter(|| {
                        let _ = normals.compute(black_box(input), &mut out);
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_cache_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("normals_cache_build");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    let (rows, cols) = (480usize, 640usize);
    let k = camera(rows, cols);
    for method in [NormalsMethod::Fals, NormalsMethod::Sri] {
        let config = NormalsConfig::new(rows, cols, DataType::F32, k, 5, method);
        group.bench_with_input(
            BenchmarkId::new(method.as_str(), format!("{}x{}", cols, rows)),
            &config,
            |b, config| {
                b.iter(|| {
                    if let Ok(mut normals) = RgbdNormals::new(black_box(config.clone())) {
                        let _ = normals.initialize();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_normals_compute, benchmark_cache_build);
criterion_main!(benches);
