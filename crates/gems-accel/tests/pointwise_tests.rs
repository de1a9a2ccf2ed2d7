//! Pointwise operators through the public API.

use gems_accel::*;

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec_approx_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y))
}

#[test]
fn test_add_various_sizes() {
    let gems = Gems::default();
    for size in [3usize, 1024, 10_000] {
        let a = gems.tensor([size], (0..size).map(|i| i as f32).collect()).unwrap();
        let b = gems.tensor([size], (0..size).map(|i| (i * 2) as f32).collect()).unwrap();
        let y = add(&gems, &a, &b, 1.0).unwrap();
        let expected: Vec<f32> = (0..size).map(|i| (i * 3) as f32).collect();
        assert!(vec_approx_eq(&y.to_vec(), &expected), "size {size}");
    }
}

#[test]
fn test_add_sub_alpha() {
    let gems = Gems::default();
    let a = gems.tensor([3], vec![1.0f32, 2.0, 3.0]).unwrap();
    let b = gems.tensor([3], vec![10.0f32, 20.0, 30.0]).unwrap();
    assert_eq!(add(&gems, &a, &b, 0.5).unwrap().to_vec(), vec![6.0, 12.0, 18.0]);
    assert_eq!(sub(&gems, &a, &b, 2.0).unwrap().to_vec(), vec![-19.0, -38.0, -57.0]);
}

#[test]
fn test_integer_arithmetic_wraps() {
    let gems = Gems::default();
    let a = gems.tensor([2], vec![i32::MAX, i32::MIN]).unwrap();
    let b = gems.tensor([2], vec![1, 1]).unwrap();
    assert_eq!(add(&gems, &a, &b, 1).unwrap().to_vec(), vec![i32::MIN, i32::MIN + 1]);
    assert_eq!(sub(&gems, &a, &b, 1).unwrap().to_vec(), vec![i32::MAX - 1, i32::MAX]);
    assert_eq!(add(&gems, &a, &b, 2).unwrap().to_vec(), vec![i32::MIN + 1, i32::MIN + 2]);
    assert_eq!(mul(&gems, &a, &a).unwrap().to_vec(), vec![1, 0]);
    assert_eq!(neg(&gems, &a).unwrap().to_vec(), vec![i32::MIN + 1, i32::MIN]);
    assert_eq!(abs(&gems, &a).unwrap().to_vec(), vec![i32::MAX, i32::MIN]);

    let x = gems.tensor([3], vec![250u8, 3, 128]).unwrap();
    assert_eq!(add_scalar(&gems, &x, 10, 1).unwrap().to_vec(), vec![4, 13, 138]);
    assert_eq!(mul_scalar(&gems, &x, 2).unwrap().to_vec(), vec![244, 6, 0]);
}

#[test]
fn test_broadcasting() {
    let gems = Gems::default();
    let a = gems.tensor([2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    let row = gems.tensor([3], vec![10i32, 20, 30]).unwrap();
    let col = gems.tensor([2, 1], vec![100i32, 200]).unwrap();

    let y = add(&gems, &a, &row, 1).unwrap();
    assert_eq!(y.shape(), &[2, 3]);
    assert_eq!(y.to_vec(), vec![11, 22, 33, 14, 25, 36]);

    let z = mul(&gems, &row, &col).unwrap();
    assert_eq!(z.shape(), &[2, 3]);
    assert_eq!(z.to_vec(), vec![1000, 2000, 3000, 2000, 4000, 6000]);
}

#[test]
fn test_incompatible_shapes() {
    let gems = Gems::default();
    let a = gems.tensor([2, 3], vec![0.0f32; 6]).unwrap();
    let b = gems.tensor([2], vec![0.0f32; 2]).unwrap();
    let before = gems.ledger().allocations();
    let err = mul(&gems, &a, &b).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(gems.ledger().allocations(), before);
}

#[test]
fn test_division_follows_ieee() {
    let gems = Gems::default();
    let a = gems.tensor([3], vec![1.0f32, -1.0, 0.0]).unwrap();
    let b = gems.tensor([3], vec![0.0f32, 0.0, 0.0]).unwrap();
    let y = div(&gems, &a, &b).unwrap();
    let inf = isinf(&gems, &y).unwrap().to_vec();
    let nan = isnan(&gems, &y).unwrap().to_vec();
    assert_eq!(inf, vec![true, true, false]);
    assert_eq!(nan, vec![false, false, true]);
}

#[test]
fn test_activations() {
    let gems = Gems::default();
    let x = gems.tensor([4], vec![-2.0f32, 0.0, 1.0, f32::NAN]).unwrap();

    let r = relu(&gems, &x).unwrap().to_vec();
    assert_eq!(&r[..3], &[0.0, 0.0, 1.0]);
    assert!(r[3].is_nan());

    let s = sigmoid(&gems, &x).unwrap().to_vec();
    assert!(approx_eq(s[1], 0.5));
    assert!(approx_eq(s[2], 0.731_058_6));

    let si = silu(&gems, &x).unwrap().to_vec();
    assert!(approx_eq(si[2], 0.731_058_6));
    assert!(approx_eq(si[1], 0.0));

    let g = gelu(&gems, &x, GeluApproximate::None).unwrap().to_vec();
    assert!(approx_eq(g[1], 0.0));
    assert!(approx_eq(g[2], 0.841_344_7));
    let gt = gelu(&gems, &x, "tanh".parse().unwrap()).unwrap().to_vec();
    assert!((gt[2] - g[2]).abs() < 1e-3);
}

#[test]
fn test_gelu_mode_parsing() {
    assert_eq!("none".parse::<GeluApproximate>().unwrap(), GeluApproximate::None);
    let err = "erf".parse::<GeluApproximate>().unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_transcendental() {
    let gems = Gems::default();
    let x = gems.tensor([3], vec![0.0f32, 1.0, 4.0]).unwrap();
    assert!(vec_approx_eq(&exp(&gems, &x).unwrap().to_vec(), &[1.0, std::f32::consts::E, 4f32.exp()]));
    assert!(vec_approx_eq(&sin(&gems, &x).unwrap().to_vec(), &[0.0, 1f32.sin(), 4f32.sin()]));
    assert!(vec_approx_eq(&cos(&gems, &x).unwrap().to_vec(), &[1.0, 1f32.cos(), 4f32.cos()]));
    assert!(vec_approx_eq(&tanh(&gems, &x).unwrap().to_vec(), &[0.0, 1f32.tanh(), 4f32.tanh()]));

    let y = gems.tensor([2], vec![1.0f32, 4.0]).unwrap();
    assert_eq!(rsqrt(&gems, &y).unwrap().to_vec(), vec![1.0, 0.5]);
    assert_eq!(reciprocal(&gems, &y).unwrap().to_vec(), vec![1.0, 0.25]);
}

#[test]
fn test_pow_variants() {
    let gems = Gems::default();
    let x = gems.tensor([3], vec![1.0f32, 2.0, 3.0]).unwrap();
    assert!(vec_approx_eq(&pow_tensor_scalar(&gems, &x, 2.0).unwrap().to_vec(), &[1.0, 4.0, 9.0]));
    assert!(vec_approx_eq(&pow_scalar(&gems, 2.0, &x).unwrap().to_vec(), &[2.0, 4.0, 8.0]));
    assert!(vec_approx_eq(&pow_tensor_tensor(&gems, &x, &x).unwrap().to_vec(), &[1.0, 4.0, 27.0]));
}

#[test]
fn test_scalar_ops() {
    let gems = Gems::default();
    let x = gems.tensor([3], vec![1i64, 2, 3]).unwrap();
    assert_eq!(add_scalar(&gems, &x, 10, 2).unwrap().to_vec(), vec![21, 22, 23]);
    assert_eq!(mul_scalar(&gems, &x, -3).unwrap().to_vec(), vec![-3, -6, -9]);
}

#[test]
fn test_sign_and_bitwise() {
    let gems = Gems::default();
    let x = gems.tensor([3], vec![-2i32, 0, 5]).unwrap();
    assert_eq!(abs(&gems, &x).unwrap().to_vec(), vec![2, 0, 5]);
    assert_eq!(neg(&gems, &x).unwrap().to_vec(), vec![2, 0, -5]);
    assert_eq!(bitwise_not(&gems, &x).unwrap().to_vec(), vec![1, -1, -6]);

    let flags = gems.tensor([2], vec![true, false]).unwrap();
    assert_eq!(bitwise_not(&gems, &flags).unwrap().to_vec(), vec![false, true]);
}

#[test]
fn test_exp_out_writes_destination() {
    let gems = Gems::default();
    let x = gems.tensor([2], vec![0.0f32, 1.0]).unwrap();
    let mut out = gems.tensor([2], vec![9.0f32, 9.0]).unwrap();
    exp_out(&gems, &x, &mut out).unwrap();
    assert!(vec_approx_eq(&out.to_vec(), &[1.0, std::f32::consts::E]));

    let mut wrong = gems.tensor([3], vec![0.0f32; 3]).unwrap();
    let err = exp_out(&gems, &x, &mut wrong).unwrap_err();
    assert!(matches!(err, GemsError::InvalidShape { .. }));
}

#[test]
fn test_triu() {
    let gems = Gems::default();
    let x = gems.tensor([3, 3], (0..9).map(|v| v as f32).collect()).unwrap();
    assert_eq!(
        triu(&gems, &x, 0).unwrap().to_vec(),
        vec![0.0, 1.0, 2.0, 0.0, 4.0, 5.0, 0.0, 0.0, 8.0]
    );
    assert_eq!(
        triu(&gems, &x, -1).unwrap().to_vec(),
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 7.0, 8.0]
    );
    assert_eq!(
        triu(&gems, &x, 1).unwrap().to_vec(),
        vec![0.0, 1.0, 2.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0]
    );

    let batched = gems.tensor([2, 2, 2], vec![1.0f32; 8]).unwrap();
    assert_eq!(
        triu(&gems, &batched, 0).unwrap().to_vec(),
        vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0]
    );

    let vector = gems.tensor([3], vec![1.0f32; 3]).unwrap();
    assert!(triu(&gems, &vector, 0).unwrap_err().is_contract_violation());
}

#[test]
fn test_empty_input() {
    let gems = Gems::default();
    let x = gems.tensor([0, 4], Vec::<f32>::new()).unwrap();
    let y = exp(&gems, &x).unwrap();
    assert_eq!(y.shape(), &[0, 4]);
    assert!(y.is_empty());
}
