use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use deviser::{
    GcHeap,
    runtime::symbol_table::SymbolTable,
    syntax::reader::read_all,
};

fn make_source(functions: usize) -> String {
    let mut source = String::new();
    for i in 0..functions {
        source.push_str(&format!(
            "; function {i}\n(defun f{i} (x &rest ys)\n  (let ((a (+ x {i})) (b '(1 2 . 3)))\n    (if (< a 0) ys (cons a b))))\n"
        ));
    }
    source
}

fn bench_read(c: &mut Criterion) {
    let source = make_source(500);
    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("read_all", |b| {
        b.iter(|| {
            let mut heap = GcHeap::new();
            let mut symbols = SymbolTable::new();
            black_box(read_all(&source, &mut heap, &mut symbols).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_read);
criterion_main!(benches);
