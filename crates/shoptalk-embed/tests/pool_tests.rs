use candle_core::{DType, Device, Tensor};
use shoptalk_embed::pool::masked_mean_l2;

#[test]
fn padded_tokens_are_excluded_from_the_mean() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; the second token is padding.
    let h = Tensor::from_slice(
        &[
            1.0f32, 2.0, 3.0, 4.0, // token 0
            5.0, 6.0, 7.0, 8.0, // token 1 (masked)
        ],
        (1, 2, 4),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1i64, 0i64], (1, 2), &dev)
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let v = &v[0];
    // Only the first token contributes, so the result is [1,2,3,4]
    // normalized to unit length.
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn fully_unmasked_input_averages_every_token() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(
        &[
            2.0f32, 0.0, // token 0
            0.0, 2.0, // token 1
        ],
        (1, 2, 2),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1i64, 1i64], (1, 2), &dev)
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let v = &v[0];
    // Mean is [1,1]; normalized to 1/sqrt(2) each.
    let inv = 1.0f32 / 2.0f32.sqrt();
    assert!((v[0] - inv).abs() < 1e-5);
    assert!((v[1] - inv).abs() < 1e-5);

    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5, "pooled vector is unit length");
}
