//! End-to-end inference through the slot simulator
//!
//! Run with: cargo test --test inference

use henn::backends::slot_sim::{Ciphertext, SimContext, SimEvaluator};
use henn::prelude::*;
use henn::utils::argmax;
use henn::Matrix;

const EPS: f64 = 1e-6;

/// Client with keys for exactly the planned rotations, and the bound model
fn bind(model: UnboundModel, params: CkksParams, seed: u64) -> (SimContext, Model<SimEvaluator>) {
    let mut client = SimContext::with_seed(params.clone(), seed).unwrap();
    client.gen_rotation_keys(model.rotations(params.slots()).unwrap());
    let model = model
        .initialize(SimEvaluator::new(&client.public_key_set()))
        .unwrap();
    (client, model)
}

fn image_3x3() -> Vec<Vec<i64>> {
    vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]
}

fn ones_2x2() -> Matrix {
    vec![vec![1.0; 2]; 2]
}

fn encrypt_image(client: &mut SimContext, image: &[Vec<i64>], k: usize, s: usize) -> Ciphertext {
    let image: Vec<Vec<f64>> = image
        .iter()
        .map(|row| row.iter().map(|&p| p as f64).collect())
        .collect();
    client.encrypt_im2col(&image, k, s).unwrap()
}

#[test]
fn test_conv_single_channel() {
    let model = ModelBuilder::new()
        .layer(ConvLayer::new(3, 3, vec![ones_2x2()], vec![0.0], 1))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 1);

    let ct = encrypt_image(&mut client, &image_3x3(), 2, 1);
    let out = client.decrypt_ints(&model.infer(&ct).unwrap()).unwrap();
    assert_eq!(&out[..4], &[12, 16, 24, 28]);
    assert!(out[4..].iter().all(|&v| v == 0));
}

#[test]
fn test_conv_two_channels_with_bias() {
    let model = ModelBuilder::new()
        .layer(ConvLayer::new(
            3,
            3,
            vec![ones_2x2(), ones_2x2()],
            vec![0.0, 1.0],
            1,
        ))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 2);

    let ct = encrypt_image(&mut client, &image_3x3(), 2, 1);
    let out = client.decrypt_ints(&model.infer(&ct).unwrap()).unwrap();
    assert_eq!(&out[..8], &[12, 16, 24, 28, 13, 17, 25, 29]);
    assert!(out[8..].iter().all(|&v| v == 0));
}

#[test]
fn test_conv_integer_pixels() {
    let model = ModelBuilder::new()
        .layer(ConvLayer::new(4, 2, vec![ones_2x2()], vec![0.0], 2))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 3);

    // 4x2 image, 2x2 window, stride 2: two placements
    let image: Vec<Vec<u8>> = vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]];
    let ct = client.encrypt_im2col(&image, 2, 2).unwrap();
    let out = client.decrypt_ints(&model.infer(&ct).unwrap()).unwrap();
    assert_eq!(&out[..2], &[10, 26]);
}

#[test]
fn test_linear_square_matrix() {
    let model = ModelBuilder::new()
        .layer(LinearLayer::new(
            vec![vec![1.0, 2.0], vec![2.0, 3.0]],
            vec![2.0, 0.0],
        ))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 4);

    let ct = client.encrypt_floats(&[1.0, 1.0]).unwrap();
    let out = client.decrypt_floats(&model.infer(&ct).unwrap()).unwrap();
    assert!((out[0] - 5.0).abs() < EPS);
    assert!((out[1] - 5.0).abs() < EPS);
    assert!(out[2..].iter().all(|v| v.abs() < EPS));
}

#[test]
fn test_linear_tall_matrix() {
    let model = ModelBuilder::new()
        .layer(LinearLayer::new(
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec![2.0, 0.0, 0.0],
        ))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 5);

    let ct = client.encrypt_floats(&[1.0, 1.0]).unwrap();
    let out = client.decrypt_ints(&model.infer(&ct).unwrap()).unwrap();
    assert_eq!(&out[..3], &[5, 7, 11]);
}

#[test]
fn test_linear_wide_matrix() {
    // 2x5, input spread over 5 slots
    let weights = vec![
        vec![1.0, -1.0, 0.5, 0.0, 2.0],
        vec![0.0, 3.0, 0.0, -2.0, 1.0],
    ];
    let model = ModelBuilder::new()
        .layer(LinearLayer::new(weights, vec![0.25, -0.5]))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 6);

    let ct = client.encrypt_floats(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let out = client.decrypt_floats(&model.infer(&ct).unwrap()).unwrap();
    // 1 - 2 + 1.5 + 0 + 10 + 0.25, 0 + 6 + 0 - 8 + 5 - 0.5
    assert!((out[0] - 10.75).abs() < EPS);
    assert!((out[1] - 2.5).abs() < EPS);
}

#[test]
fn test_polynomial_activation() {
    let model = ModelBuilder::new()
        .layer(Activation::Polynomial {
            coeffs: [0.5, -1.0, 0.25],
        })
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 7);

    let ct = client.encrypt_floats(&[2.0, -1.0, 0.0]).unwrap();
    let result = model.infer(&ct).unwrap();
    assert_eq!(result.level(), 0);

    let out = client.decrypt_floats(&result).unwrap();
    for (x, y) in [2.0, -1.0, 0.0].iter().zip(&out) {
        let expected = 0.25 * x * x - x + 0.5;
        assert!((y - expected).abs() < EPS, "p({}) = {}, got {}", x, expected, y);
    }
}

#[test]
fn test_level_exhaustion_names_layer() {
    let err = ModelBuilder::new()
        .layer(Activation::Square)
        .layer(Activation::Square)
        .layer(Activation::Square)
        .build()
        .unwrap()
        .initialize({
            let client = SimContext::with_seed(CkksParams::new_test_1024(), 8).unwrap();
            SimEvaluator::new(&client.public_key_set())
        })
        .err()
        .unwrap();

    match err {
        HennError::Layer { index, kind, source } => {
            assert_eq!(index, 2);
            assert_eq!(kind, "activation");
            assert!(matches!(*source, HennError::LevelExhausted { level: 0, .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_parallel_and_sequential_channels_agree() {
    let kernels: Vec<Matrix> = (0..3)
        .map(|c| {
            (0..2)
                .map(|i| (0..2).map(|j| (c + i * 2 + j) as f64 * 0.5 - 1.0).collect())
                .collect()
        })
        .collect();
    let conv = ConvLayer::new(3, 3, kernels, vec![0.5, -0.5, 1.0], 1);

    let mut outputs = Vec::new();
    for config in [EngineConfig::default(), EngineConfig::sequential()] {
        let model = ModelBuilder::new()
            .layer(conv.clone())
            .config(config)
            .build()
            .unwrap();
        let (mut client, model) = bind(model, CkksParams::new_test_1024(), 9);
        let ct = encrypt_image(&mut client, &image_3x3(), 2, 1);
        outputs.push(client.decrypt_floats(&model.infer(&ct).unwrap()).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_shared_model_across_threads() {
    let model = ModelBuilder::new()
        .layer(LinearLayer::new(
            vec![vec![1.0, 2.0], vec![2.0, 3.0]],
            vec![2.0, 0.0],
        ))
        .build()
        .unwrap();
    let (mut client, model) = bind(model, CkksParams::new_test_1024(), 10);

    let inputs: Vec<_> = (0..4)
        .map(|i| client.encrypt_floats(&[i as f64, 1.0]).unwrap())
        .collect();
    let model = &model;
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|ct| s.spawn(move || model.infer(ct).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (i, result) in results.iter().enumerate() {
        let out = client.decrypt_floats(result).unwrap();
        assert!((out[0] - (i as f64 + 4.0)).abs() < EPS);
        assert!((out[1] - (2.0 * i as f64 + 3.0)).abs() < EPS);
    }
}

// --- MNIST-shaped network ---

fn mnist_layers() -> Vec<Layer> {
    let kernels: Vec<Matrix> = (0..4)
        .map(|c| {
            (0..7)
                .map(|i| {
                    (0..7)
                        .map(|j| 0.1 * ((c * 49 + i * 7 + j) as f64 * 0.37).sin())
                        .collect()
                })
                .collect()
        })
        .collect();
    let conv = ConvLayer::new(28, 28, kernels, vec![0.1, -0.2, 0.05, 0.0], 3);

    let dense = |rows: usize, cols: usize, salt: f64| -> LinearLayer {
        let weights = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| 0.05 * ((r * cols + c) as f64 * salt).cos())
                    .collect()
            })
            .collect();
        let bias = (0..rows).map(|r| 0.01 * r as f64).collect();
        LinearLayer::new(weights, bias)
    };

    vec![
        conv.into(),
        Activation::Square.into(),
        dense(64, 256, 0.13).into(),
        Activation::Square.into(),
        dense(10, 64, 0.71).into(),
    ]
}

fn mnist_image() -> Vec<Vec<f64>> {
    (0..28)
        .map(|r| (0..28).map(|c| ((r * 28 + c) % 17) as f64 / 16.0).collect())
        .collect()
}

/// Same network evaluated directly on plaintext values
fn forward_plain(layers: &[Layer], image: &[Vec<f64>]) -> Vec<f64> {
    let mut x: Vec<f64> = Vec::new();
    for layer in layers {
        x = match layer {
            Layer::Conv(conv) => {
                let shape = conv.shape().unwrap();
                let (wx, wy) = (
                    (shape.input_x() - shape.kernel_x()) / shape.stride() + 1,
                    (shape.input_y() - shape.kernel_y()) / shape.stride() + 1,
                );
                let mut out = Vec::new();
                for (kernel, bias) in conv.kernels.iter().zip(&conv.biases) {
                    for i in 0..wx {
                        for j in 0..wy {
                            let mut acc = *bias;
                            for ki in 0..shape.kernel_x() {
                                for kj in 0..shape.kernel_y() {
                                    acc += kernel[ki][kj]
                                        * image[i * shape.stride() + ki][j * shape.stride() + kj];
                                }
                            }
                            out.push(acc);
                        }
                    }
                }
                out
            }
            Layer::Linear(linear) => linear
                .weights
                .iter()
                .zip(&linear.bias)
                .map(|(row, b)| row.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + b)
                .collect(),
            Layer::Activation(activation) => x.iter().map(|&v| activation.eval_plain(v)).collect(),
        };
    }
    x
}

#[test]
fn test_mnist_network_matches_plaintext() {
    let layers = mnist_layers();
    let image = mnist_image();
    let expected = forward_plain(&layers, &image);
    assert_eq!(expected.len(), 10);

    let model = ModelBuilder::new().layers(layers).build().unwrap();
    let params = CkksParams::new_mnist();
    let planned = model.rotations(params.slots()).unwrap();
    let (mut client, model) = bind(model, params, 2024);

    let ct = client.encrypt_im2col(&image, 7, 3).unwrap();
    let result = model.infer(&ct).unwrap();
    assert_eq!(result.level(), model.output_context().level);

    let out = client.decrypt_floats(&result).unwrap();
    for (i, (&want, &got)) in expected.iter().zip(&out).enumerate() {
        let tolerance = 1e-2 * want.abs().max(1.0);
        assert!(
            (want - got).abs() < tolerance,
            "class {}: expected {}, got {}",
            i,
            want,
            got
        );
    }
    assert_eq!(argmax(&out[..10]), argmax(&expected));

    // One key per planned amount, nothing more
    assert_eq!(client.public_key_set().rotation_keys.num_keys(), planned.len());
}
