use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use richtext_sync::{
    normalize_initial_content, ContentSnapshot, EditableDocument, InitialContent, Mark,
    NormalizedContent, SelectionRange,
};

fn article(paragraphs: usize) -> EditableDocument {
    let mut document = EditableDocument::new(NormalizedContent::Empty);
    for i in 0..paragraphs {
        document
            .insert_text("Lorem ipsum dolor sit amet, consectetur adipiscing elit. ")
            .unwrap();
        if i % 3 == 0 {
            let end = document.selection().from;
            document
                .set_selection(SelectionRange::new(end - 11, end - 1))
                .unwrap();
            document.toggle_mark(Mark::Bold).unwrap();
            document.set_selection(SelectionRange::cursor(end)).unwrap();
        }
        document.split_block().unwrap();
    }
    document
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let document = article(200);
    let snapshot = document.to_snapshot();
    let json = snapshot.to_json_string();

    let mut group = c.benchmark_group("snapshot_roundtrip");
    group.bench_function("emit_snapshot", |b| {
        b.iter(|| black_box(document.to_snapshot()));
    });
    group.bench_function("parse_and_normalize", |b| {
        b.iter_batched(
            || json.clone(),
            |json| {
                let parsed = ContentSnapshot::from_json_str(&json).unwrap();
                black_box(normalize_initial_content(Some(&InitialContent::Structured(parsed))))
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("typing_burst", |b| {
        b.iter_batched(
            || article(20),
            |mut document| {
                for _ in 0..256 {
                    document.insert_text("a").unwrap();
                }
                document
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_snapshot_roundtrip);
criterion_main!(benches);
