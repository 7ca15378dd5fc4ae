use criterion::{Criterion, Throughput};
use libiot_at::session::registry::MAX_SUB_TOPICS;
use libiot_at::session::{Handler, Message, QoS, SubscriptionRegistry};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn bench_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_deliver");
    let registry = SubscriptionRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for i in 0..MAX_SUB_TOPICS - 1 {
        let hits = Arc::clone(&hits);
        let handler: Handler = Arc::new(move |_msg: &Message<'_>| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        registry
            .register(&format!("libiot/device/{}/cmd", i), QoS::AtMostOnce, handler)
            .expect("registry has room");
    }
    let handler: Handler = Arc::new(|_msg: &Message<'_>| {});
    registry
        .register("libiot/+/+/telemetry", QoS::AtMostOnce, handler)
        .expect("registry has room");

    let line = "+TCMQTTRCVPUB:\"libiot/device/7/cmd\",12,\"{\"led\":true}\"";
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("deliver_notification", |b| {
        b.iter(|| black_box(registry.deliver_notification(black_box(line))))
    });
    group.finish();
}
