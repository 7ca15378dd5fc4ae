use criterion::Criterion;
use libiot_at::session::EventFlags;
use libiot_at::session::flags::{KEEPALIVE, MQTT_CONNECTED, SUBSCRIBED};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_set_clear(c: &mut Criterion) {
    let flags = EventFlags::new();
    c.bench_function("flags_set_clear", |b| {
        b.iter(|| {
            flags.set(black_box(SUBSCRIBED | KEEPALIVE));
            flags.clear(black_box(SUBSCRIBED));
            black_box(flags.get())
        })
    });
}

pub fn bench_wait_already_set(c: &mut Criterion) {
    let flags = EventFlags::new();
    flags.set(MQTT_CONNECTED);
    c.bench_function("flags_wait_already_set", |b| {
        b.iter(|| black_box(flags.wait(MQTT_CONNECTED, Duration::from_millis(10))))
    });
}
