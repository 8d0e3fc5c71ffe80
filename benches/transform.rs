use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use export_migrate::{
    driver::DriverKind,
    extract::{extractor_for, union_columns},
    mapping::{ColumnMapping, ColumnTarget, NewFieldTypes},
    target::{FieldType, TargetSchema},
    transform::TablePlan,
};
use serde_json::{Value, json};

fn page_records(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({"properties": {
                "Title": {"type": "title", "title": [{"plain_text": format!("Night {i}")}]},
                "When": {"type": "date", "date": {"start": "2024-06-01"}},
                "Price": {"type": "number", "number": i % 40},
                "Sold out": {"type": "select", "select": {"name": if i % 2 == 0 { "yes" } else { "no" }}},
                "Lineup": {"type": "multi_select", "multi_select": [{"name": "Ana"}, {"name": "Bo"}]},
                "Ref": {"type": "unique_id", "unique_id": {"prefix": "EV", "number": i}},
                "Venue": {"type": "relation", "relation": [{"id": "v1"}]}
            }})
        })
        .collect()
}

fn events_plan() -> TablePlan {
    let schema = TargetSchema::example();
    let events = schema.collection("events").expect("events collection");
    let mapping = ColumnMapping::from([
        ("Title".to_string(), ColumnTarget::Field("title".into())),
        ("When".to_string(), ColumnTarget::Field("date".into())),
        ("Price".to_string(), ColumnTarget::Field("ticket_price".into())),
        ("Sold out".to_string(), ColumnTarget::Field("sold_out".into())),
        ("Lineup".to_string(), ColumnTarget::Field("lineup".into())),
        ("Ref".to_string(), ColumnTarget::Synthesize),
    ]);
    let types = NewFieldTypes::from([("Ref".to_string(), FieldType::String)]);
    TablePlan::compile("Events", &mapping, &types, DriverKind::PageDatabaseExport, events)
        .expect("compile plan")
}

fn bench_transform(c: &mut Criterion) {
    let records = page_records(10_000);
    let plan = events_plan();

    let mut group = c.benchmark_group("page_database_10k");
    group.bench_function("discover_columns", |b| {
        b.iter(|| union_columns(extractor_for(DriverKind::PageDatabaseExport), records.iter()))
    });
    group.bench_function("transform_all", |b| {
        b.iter_batched(
            || records.clone(),
            |records| plan.transform_all(&records),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_transform);
criterion_main!(benches);
