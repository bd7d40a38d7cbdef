use criterion::{black_box, criterion_group, criterion_main, Criterion};
use henn::backends::slot_sim::{SimContext, SimEvaluator};
use henn::encoding::DiagonalMatrix;
use henn::packing::pack;
use henn::prelude::*;

fn dense(rows: usize, cols: usize) -> LinearLayer {
    let weights = (0..rows)
        .map(|r| (0..cols).map(|c| ((r * cols + c) as f64 * 0.1).sin()).collect())
        .collect();
    LinearLayer::new(weights, vec![0.0; rows])
}

/// Benchmark im2col of a 28×28 image with a 7×7 window, stride 3.
fn bench_pack(c: &mut Criterion) {
    let image: Vec<Vec<f64>> = (0..28)
        .map(|r| (0..28).map(|c| (r * 28 + c) as f64).collect())
        .collect();

    c.bench_function("im2col 28×28 k7 s3", |bencher| {
        bencher.iter(|| pack(black_box(&image), 7, 3).unwrap())
    });
}

/// Benchmark diagonal extraction for a 64×256 dense layer.
fn bench_diagonals(c: &mut Criterion) {
    let layer = dense(64, 256);

    c.bench_function("diagonals 64×256 @4096 slots", |bencher| {
        bencher.iter(|| DiagonalMatrix::new(black_box(&layer), 4096).unwrap())
    });
}

/// Benchmark encrypted 64×256 matrix-vector product (BSGS).
fn bench_linear_infer(c: &mut Criterion) {
    let params = CkksParams::new_mnist();
    let model = ModelBuilder::new().layer(dense(64, 256)).build().unwrap();

    let mut client = SimContext::with_seed(params.clone(), 1).unwrap();
    client.gen_rotation_keys(model.rotations(params.slots()).unwrap());
    let model = model
        .initialize(SimEvaluator::new(&client.public_key_set()))
        .unwrap();
    let ct = client.encrypt_floats(&vec![0.5; 256]).unwrap();

    c.bench_function("encrypted dense 64×256", |bencher| {
        bencher.iter(|| model.infer(black_box(&ct)).unwrap())
    });
}

/// Benchmark a 4-channel convolution, parallel vs sequential channels.
fn bench_conv_infer(c: &mut Criterion) {
    let params = CkksParams::new_mnist();
    let kernels = vec![vec![vec![0.1; 7]; 7]; 4];
    let image = vec![vec![0.5; 28]; 28];

    for (name, config) in [
        ("encrypted conv 4ch (parallel)", EngineConfig::default()),
        ("encrypted conv 4ch (sequential)", EngineConfig::sequential()),
    ] {
        let model = ModelBuilder::new()
            .layer(ConvLayer::new(28, 28, kernels.clone(), vec![0.0; 4], 3))
            .config(config)
            .build()
            .unwrap();
        let mut client = SimContext::with_seed(params.clone(), 2).unwrap();
        client.gen_rotation_keys(model.rotations(params.slots()).unwrap());
        let model = model
            .initialize(SimEvaluator::new(&client.public_key_set()))
            .unwrap();
        let ct = client.encrypt_im2col(&image, 7, 3).unwrap();

        c.bench_function(name, |bencher| {
            bencher.iter(|| model.infer(black_box(&ct)).unwrap())
        });
    }
}

criterion_group!(
    benches,
    bench_pack,
    bench_diagonals,
    bench_linear_infer,
    bench_conv_infer
);
criterion_main!(benches);
