//! Softmax and layer norm through the public API.

use gems_accel::*;

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec_approx_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y))
}

#[test]
fn test_softmax_last_dim() {
    let gems = Gems::default();
    let x = gems.tensor([2, 2], vec![1.0f32, 1.0, 1000.0, 1000.0]).unwrap();
    let y = softmax(&gems, &x, -1).unwrap();
    assert!(vec_approx_eq(&y.to_vec(), &[0.5, 0.5, 0.5, 0.5]));
}

#[test]
fn test_softmax_inner_dim() {
    let gems = Gems::default();
    let data: Vec<f32> = (0..24).map(|v| (v as f32 * 0.37).sin()).collect();
    let x = gems.tensor([2, 3, 4], data).unwrap();
    let y = softmax(&gems, &x, 1).unwrap().to_vec();
    for n in 0..2 {
        for w in 0..4 {
            let total: f32 = (0..3).map(|c| y[n * 12 + c * 4 + w]).sum();
            assert!(approx_eq(total, 1.0), "column ({n}, {w}) sums to {total}");
        }
    }
}

#[test]
fn test_layer_norm_stats() {
    let gems = Gems::default();
    let x = gems.tensor([2, 4], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0, 5.0]).unwrap();
    let (out, mean, rstd) = layer_norm(&gems, &x, &[4], None, None, 0.0).unwrap();

    assert_eq!(mean.shape(), &[2]);
    assert_eq!(rstd.shape(), &[2]);
    assert!(vec_approx_eq(&mean.to_vec()[..1], &[2.5]));
    let r = 1.0 / 1.25f32.sqrt();
    assert!(approx_eq(rstd.to_vec()[0], r));
    assert!(vec_approx_eq(&out.to_vec()[..4], &[-1.5 * r, -0.5 * r, 0.5 * r, 1.5 * r]));
    // constant row with eps = 0 has infinite rstd
    assert!(rstd.to_vec()[1].is_infinite());
}

#[test]
fn test_layer_norm_affine() {
    let gems = Gems::default();
    let x = gems.tensor([1, 2], vec![0.0f32, 2.0]).unwrap();
    let w = gems.tensor([2], vec![2.0f32, 3.0]).unwrap();
    let b = gems.tensor([2], vec![10.0f32, 20.0]).unwrap();
    let (out, _, _) = layer_norm(&gems, &x, &[2], Some(&w), Some(&b), 0.0).unwrap();
    assert!(vec_approx_eq(&out.to_vec(), &[8.0, 23.0]));
}

#[test]
fn test_layer_norm_shape_contract() {
    let gems = Gems::default();
    let x = gems.tensor([2, 4], vec![0.0f32; 8]).unwrap();
    let err = layer_norm(&gems, &x, &[3], None, None, 1e-5).unwrap_err();
    assert!(err.is_contract_violation());

    let w = gems.tensor([3], vec![1.0f32; 3]).unwrap();
    let err = layer_norm(&gems, &x, &[4], Some(&w), None, 1e-5).unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_layer_norm_many_rows() {
    let gems = Gems::default();
    let rows = 37;
    let data: Vec<f32> = (0..rows * 16).map(|v| (v % 16) as f32).collect();
    let x = gems.tensor([rows, 16], data).unwrap();
    let (out, mean, _) = layer_norm(&gems, &x, &[16], None, None, 1e-5).unwrap();
    assert!(mean.to_vec().iter().all(|&m| approx_eq(m, 7.5)));
    let out = out.to_vec();
    let first = &out[..16];
    for row in out.chunks(16) {
        assert!(vec_approx_eq(row, first));
    }
}
