use candle_core::Device;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seiki_core::{encode_batch, CharVocab, ModelConfig, ModelMode, Seq2Seq};

fn bench_encode_and_decode(c: &mut Criterion) {
    let inputs = vec![
        "2020-01-02",
        "1999-12-31",
        "Jan 2nd 2020",
        "2 January 2020",
        "02.01.2020",
    ];
    let targets = vec!["01/02/2020", "12/31/1999"];

    let source = CharVocab::source(&inputs);
    let target = CharVocab::target(&targets);

    c.bench_function("encode_batch_5", |b| {
        b.iter(|| encode_batch(&source, black_box(inputs.as_slice())).unwrap());
    });

    let model = Seq2Seq::new(
        ModelConfig::for_vocabs(&source, &target),
        ModelMode::Eval,
        &Device::Cpu,
    )
    .unwrap();
    let batch = encode_batch(&source, inputs.as_slice()).unwrap();

    c.bench_function("greedy_decode_batch_5", |b| {
        b.iter(|| model.greedy_decode(black_box(&batch)).unwrap());
    });
}

criterion_group!(benches, bench_encode_and_decode);
criterion_main!(benches);
