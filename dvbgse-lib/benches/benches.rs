use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use dvbgse::{gse::SinkRegistry, integrity::compute_crc8, DecodeOpts};

/// Mode adaptation framed baseband frame filled with `count` complete IPv4 GSE frames.
fn fixture(count: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..count {
        data.extend([0xe0, 0x16, 0x08, 0x00]);
        data.extend([0x45u8; 20]);
    }
    let dfl = u16::try_from(data.len() * 8).unwrap().to_be_bytes();
    let mut bb = vec![0x72, 0x00, 0x00, 0x00, dfl[0], dfl[1], 0x00, 0x00, 0x00];
    bb.push(compute_crc8(&bb));

    let mut buf = vec![0xb8, 0x04];
    buf.extend(bb);
    buf.extend(data);
    buf
}

fn bench_crc8(c: &mut Criterion) {
    let data = [0x5au8; 9];
    let mut group = c.benchmark_group("crc8");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("bbheader", |b| b.iter(|| compute_crc8(&data)));
}

fn bench_decode(c: &mut Criterion) {
    let buf = fixture(300);
    let opts = DecodeOpts::default();
    let mut sinks = SinkRegistry::default();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("300 gse frames", |b| {
        b.iter(|| dvbgse::decode(&buf, &opts, &mut sinks).unwrap());
    });
}

criterion_group!(benches, bench_crc8, bench_decode);
criterion_main!(benches);
