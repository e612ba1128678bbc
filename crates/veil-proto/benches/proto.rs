//! Benchmarks for first-frame parsing.

use bytes::BytesMut;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use veil_proto::{AddressRef, HASH_LEN, HostRef, parse_header, write_trojan_request, write_vless_request};

const UUID: [u8; 16] = [7u8; 16];

fn vless_frame(host: HostRef<'_>) -> bytes::Bytes {
    let addr = AddressRef { host, port: 443 };
    let mut buf = BytesMut::new();
    write_vless_request(&mut buf, &UUID, &addr, b"hello world payload data").unwrap();
    buf.freeze()
}

fn bench_parse_vless_ipv4(c: &mut Criterion) {
    let buf = vless_frame(HostRef::Ipv4([1, 2, 3, 4]));
    c.bench_function("parse_vless_ipv4", |b| b.iter(|| parse_header(black_box(&buf))));
}

fn bench_parse_vless_ipv6(c: &mut Criterion) {
    let buf = vless_frame(HostRef::Ipv6([
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
    ]));
    c.bench_function("parse_vless_ipv6", |b| b.iter(|| parse_header(black_box(&buf))));
}

fn bench_parse_vless_domain(c: &mut Criterion) {
    let buf = vless_frame(HostRef::Domain("example.com"));
    c.bench_function("parse_vless_domain", |b| {
        b.iter(|| parse_header(black_box(&buf)))
    });
}

fn bench_parse_trojan(c: &mut Criterion) {
    let mut buf = BytesMut::new();
    write_trojan_request(&mut buf, &[b'a'; HASH_LEN], b"\r\n\x01\x01\x01\x02\x03\x04\x01\xbb\r\n")
        .unwrap();
    let buf = buf.freeze();
    c.bench_function("parse_trojan", |b| b.iter(|| parse_header(black_box(&buf))));
}

criterion_group!(
    benches,
    bench_parse_vless_ipv4,
    bench_parse_vless_ipv6,
    bench_parse_vless_domain,
    bench_parse_trojan,
);
criterion_main!(benches);
