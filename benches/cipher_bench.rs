use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;
use unquarantine::config::ExtractConfig;
use unquarantine::crypto::{decrypt, decrypt_in_place, decrypt_stream, encrypt};
use unquarantine::evidence::{Candidate, CandidateExtractor};
use unquarantine::matcher::Matcher;
use unquarantine::recovery::Artifact;

fn bench_cipher(c: &mut Criterion) {
    let plain: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    let data = encrypt(&plain);

    c.bench_function("decrypt_1mb", |b| b.iter(|| decrypt(black_box(&data))));
    c.bench_function("decrypt_in_place_1mb", |b| {
        b.iter(|| {
            let mut buf = data.clone();
            decrypt_in_place(black_box(&mut buf));
            buf
        })
    });
    c.bench_function("decrypt_stream_1mb", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(data.len());
            decrypt_stream(Cursor::new(black_box(&data)), &mut out).unwrap();
            out
        })
    });
}

fn bench_extract(c: &mut Criterion) {
    let ex = CandidateExtractor::new(&ExtractConfig::default()).unwrap();
    let text: String = (0..500)
        .map(|i| format!("Setup_{i}.exe    {}.{} KB    Application\n", 10 + i, i % 10))
        .collect();

    c.bench_function("extract_500_lines", |b| b.iter(|| ex.extract(black_box(&text))));
}

fn bench_propose(c: &mut Criterion) {
    let artifacts: Vec<Artifact> = (1..=200)
        .map(|i| Artifact {
            index:  i,
            source: format!("q/{i}.NQF").into(),
            output: format!("out/{i}/{i}.NQF.00000000_ESET.out").into(),
            size:   (i as u64) * 4_000,
            digest: String::new(),
        })
        .collect();
    let candidates: Vec<Candidate> = (1..=2000u64)
        .map(|i| Candidate::new(format!("file_{i}.zip"), i * 401))
        .collect();
    let matcher = Matcher::default();

    c.bench_function("propose_200x2000", |b| {
        b.iter(|| matcher.propose(black_box(&artifacts), black_box(&candidates)))
    });
}

criterion_group!(benches, bench_cipher, bench_extract, bench_propose);
criterion_main!(benches);
