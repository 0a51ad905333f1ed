//! Benchmarks for the routing preparation pass

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use signalpath_core::domain::audio::{output_flags, Direction};
use signalpath_core::domain::collection::RouteCollection;
use signalpath_core::domain::route::{StreamRoute, StreamRouteConfig};
use signalpath_core::domain::stream::Stream;
use signalpath_core::domain::testing::MockDevice;

fn build_collection(route_count: usize) -> RouteCollection {
    let mut collection = RouteCollection::new();
    for i in 0..route_count {
        let port = format!("port{i}");
        collection.add_port(&port).unwrap();
        collection
            .add_stream_route(
                &format!("route{i}"),
                Direction::Playback,
                None,
                Some(&port),
                StreamRoute::new(
                    StreamRouteConfig {
                        flag_mask: output_flags::PRIMARY | (1 << (i % 5)),
                        ..Default::default()
                    },
                    Box::new(MockDevice::new()),
                ),
            )
            .unwrap();
    }
    collection
}

fn bench_prepare_routing(c: &mut Criterion) {
    let mut collection = build_collection(16);
    for _ in 0..4 {
        let stream = Stream::playback(output_flags::PRIMARY);
        stream.set_started(true);
        collection.add_stream(stream);
    }

    c.bench_function("prepare_routing_16_routes_4_streams", |b| {
        b.iter(|| {
            collection.reset_availability();
            std::hint::black_box(collection.prepare_routing());
        });
    });
}

fn bench_idle_cycle(c: &mut Criterion) {
    let mut collection = build_collection(16);

    c.bench_function("prepare_routing_idle", |b| {
        b.iter(|| {
            collection.reset_availability();
            std::hint::black_box(collection.prepare_routing());
        });
    });
}

criterion_group!(benches, bench_prepare_routing, bench_idle_cycle);
criterion_main!(benches);
