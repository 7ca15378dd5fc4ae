use criterion::{BatchSize, Criterion, Throughput};
use libiot_at::at::{UrcDispatch, UrcTable};
use libiot_at::session::{ModuleProfile, SessionContext};
use std::hint::black_box;
use std::sync::Arc;

const LINES: [&str; 6] = [
    "+TCMQTTSTATE:1",
    "+CREG: 0,1",
    "+TCMQTTSUB:OK",
    "OK",
    "AT version:2.2.0",
    "+TCMQTTRCVPUB:\"libiot/bench\",5,\"hello\"",
];

pub fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("urc_dispatch");
    group.throughput(Throughput::Elements(LINES.len() as u64));

    for profile in [ModuleProfile::Cellular, ModuleProfile::Wifi] {
        group.bench_function(format!("{:?}", profile), |b| {
            b.iter_batched_ref(
                || UrcTable::new(profile.rules(), Arc::new(SessionContext::new())),
                |table| {
                    for line in LINES {
                        black_box(table.dispatch(black_box(line)));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}
