use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rainlang_bytecode::OpMetaTable;
use rainlang_parser::parse;

fn bench_statements(c: &mut Criterion) {
    let table = OpMetaTable::builtin();

    c.bench_function("parse_single_statement", |b| {
        b.iter(|| parse(black_box("_: add(1 2);"), table));
    });

    let nested = "a: 10, b: 20, c: mul(add(a b) sub(b a) 3), _: if(gt(c 100) c div(c 2));";
    c.bench_function("parse_nested", |b| {
        b.iter(|| parse(black_box(nested), table));
    });
}

fn bench_document_size(c: &mut Criterion) {
    let table = OpMetaTable::builtin();
    let mut group = c.benchmark_group("document_size");

    for statements in [10usize, 100, 1000] {
        let text = (0..statements)
            .map(|i| format!("v{}: add({} 0x{:x} 1e3)", i, i, i))
            .collect::<Vec<_>>()
            .join(", ")
            + ";";
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("statements", statements), &text, |b, text| {
            b.iter(|| parse(black_box(text), table));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_statements, bench_document_size);
criterion_main!(benches);
