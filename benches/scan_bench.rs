//! Benchmarks for the scan engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reclaim::config::{GlobalConfig, Rule};
use reclaim::engine::ScanEngine;
use reclaim::worker::RunState;
use std::fs::{self, File};
use std::io::Write;
use tempfile::TempDir;

/// Create a benchmark directory with the given number of files spread over `dir_count` directories
fn create_benchmark_dir(file_count: usize, dir_count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let files_per_dir = file_count / dir_count.max(1);

    for d in 0..dir_count {
        let subdir = root.join(format!("dir{}", d));
        fs::create_dir(&subdir).unwrap();

        for f in 0..files_per_dir {
            let ext = if f % 2 == 0 { "log" } else { "txt" };
            let mut file = File::create(subdir.join(format!("file{}.{}", f, ext))).unwrap();
            file.write_all(&[b'x'; 1024]).unwrap();
        }
    }

    dir
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let config = GlobalConfig::default();
    let engine = ScanEngine::new();

    for size in [100, 500, 1000].iter() {
        let dir = create_benchmark_dir(*size, 10);
        let rules = vec![Rule::new("bench", dir.path()).with_patterns(["**/*.log"])];

        group.bench_with_input(BenchmarkId::new("glob", size), size, |b, _| {
            b.iter(|| engine.scan(black_box(&rules), &config, &RunState::new()))
        });
    }

    group.finish();
}

fn benchmark_directory_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_units");
    let dir = create_benchmark_dir(1000, 50);
    let config = GlobalConfig::default();
    let engine = ScanEngine::new();

    // Every top-level directory matches and is sized as a whole
    let rules = vec![Rule::new("bench", dir.path()).with_patterns(["dir*"])];

    group.bench_function("whole_dirs", |b| {
        b.iter(|| engine.scan(black_box(&rules), &config, &RunState::new()))
    });

    group.finish();
}

criterion_group!(benches, benchmark_scan, benchmark_directory_units);
criterion_main!(benches);
