use criterion::{criterion_group, criterion_main};

mod at;
mod session;

criterion_group!(
    benches,
    at::urc::bench_dispatch,
    at::executor::bench_format_command,
    session::flags::bench_set_clear,
    session::flags::bench_wait_already_set,
    session::registry::bench_deliver
);
criterion_main!(benches);
