use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use textmark_engine::anchoring::{
    AnnotationMarkerFactory, PathSelector, TargetSelector, insert, remove, resolve,
};
use textmark_engine::markup::parse;
use textmark_engine::profile::DocumentProfile;
use textmark_engine::registry::{AnnotationRegistry, FragmentTarget};
mod common;

fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay");
    group.sample_size(20);

    let mut doc = parse(&common::generate_article(200));
    let profile = DocumentProfile::default();
    let selector = PathSelector::new(
        format!("char({},4)", common::paragraph_path(20)).parse().unwrap(),
        format!("char({},6)", common::paragraph_path(40)).parse().unwrap(),
    );

    group.bench_function("insert_remove", |b| {
        b.iter(|| {
            let range = resolve(&doc, &profile, &selector).unwrap();
            let mut factory = AnnotationMarkerFactory::new(&profile, "bench");
            let inserted = insert(&mut doc, &profile, black_box(&range), &mut factory);
            remove(&mut doc, &inserted.markers);
        });
    });

    group.finish();
}

fn bench_registry_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay");
    group.sample_size(10);

    let content = common::generate_article(200);
    let targets: Vec<FragmentTarget> = (1..=100)
        .map(|n| {
            let path = common::paragraph_path(n * 2);
            FragmentTarget::new(
                format!("a{n}").into(),
                "bench.html",
                TargetSelector::Path(PathSelector::new(
                    format!("char({path},2)").parse().unwrap(),
                    format!("after-node({path})").parse().unwrap(),
                )),
            )
        })
        .collect();

    group.bench_function("load_100", |b| {
        b.iter(|| {
            let mut doc = parse(&content);
            let mut registry = AnnotationRegistry::new(DocumentProfile::default());
            let report = registry.load(&mut doc, black_box(targets.clone()));
            black_box(report);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert_remove, bench_registry_load);
criterion_main!(benches);
