use criterion::{criterion_group, criterion_main, Criterion};
use gatematch::{
    LayerId, MatchingSession, MemoryModel, RasterView, Region, SessionParameters, SummationTables,
    TemplateEntry, TemplateId,
};
use std::hint::black_box;

fn make_layer_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push((((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8);
        }
    }
    data
}

fn bench_summation_tables(c: &mut Criterion) {
    let width = 512;
    let height = 512;
    let image = make_layer_image(width, height);
    let view = RasterView::from_slice(&image, width, height).unwrap();
    let region = Region::new(0, 0, width, height);

    c.bench_function("summation_tables_build_512", |b| {
        b.iter(|| black_box(SummationTables::build(view, region).unwrap()));
    });
}

fn bench_session(c: &mut Criterion) {
    let width = 512;
    let height = 512;
    let image = make_layer_image(width, height);
    let view = RasterView::from_slice(&image, width, height).unwrap();

    let mut params = SessionParameters::new(Region::new(0, 0, width, height), LayerId(0));
    params.scale_down = 2;
    params.tau_hill_climb = 0.6;
    params.tau_detect = 0.85;
    params.max_step = 4;

    let entry = TemplateEntry::new(TemplateId(1), Region::new(120, 100, 168, 148));
    let session = MatchingSession::new(params, vec![entry]);

    c.bench_function("session_free_scan_512", |b| {
        b.iter(|| {
            let model = MemoryModel::new();
            black_box(session.run(view, &model).unwrap())
        });
    });
}

criterion_group!(benches, bench_summation_tables, bench_session);
criterion_main!(benches);
