use criterion::{black_box, criterion_group, criterion_main, Criterion};
use preen_engine::{DirAttributes, FileAttributes, PatternSet, RelPath};

fn parse_file_attributes_benchmark(c: &mut Criterion) {
    c.bench_function("attr::FileAttributes::parse", |b| {
        b.iter(|| FileAttributes::parse(black_box("encrypted_private_dot_id_rsa.tmpl")))
    });
}

fn render_file_attributes_benchmark(c: &mut Criterion) {
    let attr = FileAttributes::parse("encrypted_private_dot_id_rsa.tmpl");
    c.bench_function("attr::FileAttributes::source_name", |b| {
        b.iter(|| black_box(&attr).source_name().unwrap())
    });
}

fn parse_dir_attributes_benchmark(c: &mut Criterion) {
    c.bench_function("attr::DirAttributes::parse", |b| {
        b.iter(|| DirAttributes::parse(black_box("exact_private_dot_gnupg")))
    });
}

fn pattern_set_match_benchmark(c: &mut Criterion) {
    let mut set = PatternSet::new();
    for i in 0..50 {
        set.add(&format!("dir{i}/**"), true).unwrap();
    }
    set.add("dir25/keep", false).unwrap();
    let name = RelPath::new("dir25/keep");

    c.bench_function("pattern::PatternSet::matches (50 patterns)", |b| {
        b.iter(|| set.matches(black_box(&name)))
    });
}

criterion_group!(
    benches,
    parse_file_attributes_benchmark,
    render_file_attributes_benchmark,
    parse_dir_attributes_benchmark,
    pattern_set_match_benchmark
);
criterion_main!(benches);
