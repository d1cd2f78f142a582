//! Benchmarks for SAD recognition and rewriting.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use fusor_ir::{Function, InstBuilder, Intrinsic, Type, ValueId};
use fusor_passes::{fuse_sad, TargetConfig};

/// Masked-shift extraction of byte `i`.
fn extract(builder: &mut InstBuilder<'_>, word: ValueId, i: u64) -> ValueId {
    let amount = builder.constant(Type::I32, 8 * i);
    let mask = builder.constant(Type::I32, 0xFF);
    let shifted = builder.lshr(word, amount).unwrap();
    builder.and(shifted, mask).unwrap()
}

/// Builds a function holding `count` independent SAD idiom instances.
fn build_candidates(count: usize) -> Function {
    let mut func = Function::new("bench");
    let a = func.new_arg(Type::I32);
    let b = func.new_arg(Type::I32);
    let acc = func.new_arg(Type::I32);
    let entry = func.entry();
    let mut builder = InstBuilder::at_end(&mut func, entry);
    for _ in 0..count {
        let mut sum = acc;
        for i in 0..4 {
            let ea = extract(&mut builder, a, i);
            let eb = extract(&mut builder, b, i);
            let diff = builder.sub(ea, eb).unwrap();
            let term = builder.call(Intrinsic::Abs, &[diff]).unwrap();
            sum = builder.add(sum, term).unwrap();
        }
    }
    func
}

/// Builds a long non-matching addition chain to exercise the flattener.
fn build_long_chain(leaves: usize) -> Function {
    let mut func = Function::new("chain");
    let a = func.new_arg(Type::I32);
    let entry = func.entry();
    let mut builder = InstBuilder::at_end(&mut func, entry);
    let mut sum = a;
    for _ in 1..leaves {
        sum = builder.add(sum, a).unwrap();
    }
    func
}

fn bench_fuse(c: &mut Criterion) {
    let config = TargetConfig::baseline().with_sad_fusion(true);
    let mut group = c.benchmark_group("fuse_sad");

    for &count in &[1usize, 8, 64] {
        group.bench_with_input(
            BenchmarkId::new("candidates", count),
            &count,
            |bench, &count| {
                bench.iter_batched(
                    || build_candidates(count),
                    |mut func| black_box(fuse_sad(&mut func, &config).unwrap()),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_long_chain(c: &mut Criterion) {
    let config = TargetConfig::baseline().with_sad_fusion(true);
    let mut group = c.benchmark_group("add_chain");

    for &leaves in &[100usize, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("leaves", leaves),
            &leaves,
            |bench, &leaves| {
                bench.iter_batched(
                    || build_long_chain(leaves),
                    |mut func| black_box(fuse_sad(&mut func, &config).unwrap()),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fuse, bench_long_chain);
criterion_main!(benches);
