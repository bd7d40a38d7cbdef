//! Encrypted MNIST-shaped inference, client and server in one process
//!
//! Network: conv 7×7 stride 3 (4 channels) → x² → dense 64×256 → x² → dense 10×64
//!
//! Weights are synthetic; the point is the data flow and the depth budget.
//!
//! Run with: RUST_LOG=henn=debug cargo run --release --example encrypted_mnist

use std::time::Instant;

use henn::backends::slot_sim::{SimContext, SimEvaluator};
use henn::prelude::*;
use henn::utils::{argmax, normalize_pixels};
use henn::Matrix;
use tracing_subscriber::EnvFilter;

fn synthetic_model() -> henn::Result<UnboundModel> {
    let kernels: Vec<Matrix> = (0..4)
        .map(|c| {
            (0..7)
                .map(|i| (0..7).map(|j| 0.1 * ((c * 49 + i * 7 + j) as f64).sin()).collect())
                .collect()
        })
        .collect();

    let dense = |rows: usize, cols: usize| {
        let weights: Matrix = (0..rows)
            .map(|r| (0..cols).map(|c| 0.05 * ((r * cols + c) as f64 * 0.3).cos()).collect())
            .collect();
        LinearLayer::new(weights, vec![0.0; rows])
    };

    ModelBuilder::new()
        .layer(ConvLayer::new(28, 28, kernels, vec![0.0; 4], 3))
        .layer(Activation::Square)
        .layer(dense(64, 256))
        .layer(Activation::Square)
        .layer(dense(10, 64))
        .build()
}

fn synthetic_digit() -> Vec<Vec<u8>> {
    // A vertical bar, roughly a "1"
    (0..28)
        .map(|r| {
            (0..28)
                .map(|c| if (12..16).contains(&c) && (4..24).contains(&r) { 255 } else { 0 })
                .collect()
        })
        .collect()
}

fn main() -> henn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("========== ENCRYPTED MNIST INFERENCE ==========");

    let params = CkksParams::new_mnist();
    let model = synthetic_model()?;
    println!("\nParameters:");
    println!("  N = {} ({} slots)", params.n, params.slots());
    println!("  Levels = {}, model depth = {}", params.max_level(), model.depth());
    println!("  Scale = 2^{}", params.scale.log2());

    // Client: keys for the planned rotations only
    let start = Instant::now();
    let rotations = model.rotations(params.slots())?;
    let mut client = SimContext::new(params)?;
    client.gen_rotation_keys(rotations.iter().copied());
    println!("\nKey generation: {} rotation keys in {:?}", rotations.len(), start.elapsed());

    // Server: bind evaluation keys and encode the layers
    let start = Instant::now();
    let model = model.initialize(SimEvaluator::new(&client.public_key_set()))?;
    println!("Layer encoding: {:?}", start.elapsed());

    // Client: normalize, pack and encrypt
    let image = normalize_pixels(&synthetic_digit());
    let ct = client.encrypt_im2col(&image, 7, 3)?;

    // Server: evaluate
    let start = Instant::now();
    let result = model.infer(&ct)?;
    println!("Inference: {:?} (output level {})", start.elapsed(), result.level());

    // Client: decrypt and classify
    let scores = client.decrypt_floats(&result)?;
    println!("\nScores:");
    for (digit, score) in scores[..10].iter().enumerate() {
        println!("  {}: {:>12.4}", digit, score);
    }
    if let Some(prediction) = argmax(&scores[..10]) {
        println!("\nPrediction: {}", prediction);
    }

    Ok(())
}
