use criterion::{Criterion, Throughput};
use libiot_at::at::executor::format_command;
use std::hint::black_box;

pub fn bench_format_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_command");
    let payload = "x".repeat(180);
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("inline_publish", |b| {
        b.iter(|| {
            format_command(format_args!(
                "AT+TCMQTTPUB=\"{}\",{},\"{}\"",
                black_box("libiot/bench-topic"),
                black_box(1u8),
                black_box(payload.as_str())
            ))
            .expect("command fits")
        })
    });
    group.finish();
}
