use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use permrepo_core::codec::{decode, encode};
use permrepo_core::{Application, Authorization, Permissions, Resource, ResourceKind};

const APPLICATIONS: usize = 2_000;

fn applications() -> BTreeMap<String, Resource> {
    (0..APPLICATIONS)
        .map(|i| {
            let name = format!("app-{i:05}");
            let app = Application::new(&name).with_permissions(
                Permissions::new()
                    .grant(Authorization::Read, ["dev", "qa"])
                    .grant(Authorization::Write, ["ops"]),
            );
            (name, Resource::from(app))
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let resources = applications();
    let blob = encode(ResourceKind::Application, &resources).expect("encode");

    c.bench_function("encode_applications", |b| {
        b.iter(|| encode(ResourceKind::Application, black_box(&resources)).expect("encode"))
    });
    c.bench_function("decode_applications", |b| {
        b.iter(|| decode(ResourceKind::Application, Some(black_box(blob.as_slice()))).expect("decode"))
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
