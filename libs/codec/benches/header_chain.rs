//! Header chain throughput
//!
//! Measures the cascade on a typical JMS-style message (one RFH2 with three folders) and
//! on a bare payload, where the cost should be a handful of failed id comparisons.

use codec::{decode_chain, encode_envelope, encode_headers};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use types::constants::MQENC_NATIVE;
use types::{Envelope, Header, Rfh2Field, Rfh2Header};

fn jms_header() -> Header {
    Header::Rfh2(
        Rfh2Header::new()
            .with_folder("<mcd><Msd>jms_text</Msd></mcd>")
            .with_folder("<jms><Dst>queue:///ORDERS</Dst><Pri>4</Pri></jms>")
            .with_folder("<usr><region>emea</region><retries dt='i4'>3</retries></usr>"),
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chain");

    let mut with_rfh2 = encode_headers(&[jms_header()], MQENC_NATIVE).unwrap_or_default();
    with_rfh2.extend_from_slice(&[b'x'; 512]);
    group.bench_function("rfh2_three_folders", |b| {
        b.iter(|| decode_chain(black_box(&with_rfh2), 0, MQENC_NATIVE))
    });

    let bare = vec![b'x'; 512];
    group.bench_function("bare_payload", |b| {
        b.iter(|| decode_chain(black_box(&bare), 0, MQENC_NATIVE))
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let envelope = Envelope::new(vec![b'x'; 512]).with_header(match jms_header() {
        Header::Rfh2(h) => Header::Rfh2(h.with_field(Rfh2Field::new("usr", "retries", 4))),
        other => other,
    });
    c.bench_function("encode_envelope_with_overlay", |b| {
        b.iter(|| encode_envelope(black_box(&envelope)))
    });
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
