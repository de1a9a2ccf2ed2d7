//! Device kernels checked against the host launchers.
//!
//! Every test returns early when no device can be opened.

#![cfg(any(feature = "cuda", feature = "wgpu"))]

use gems_accel::cube::*;
use gems_accel::{upsample_nearest2d, Gems, GemsConfig};

const EPSILON: f32 = 1e-4;

fn vec_approx_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < EPSILON * y.abs().max(1.0))
}

fn check_nearest<R: CubeclRuntime>(runtime: &RuntimeContext<R>) {
    let gems = Gems::default();
    let tuner = resize_tuner(&GemsConfig::default());
    let cases: [([usize; 4], [usize; 2], Option<f64>); 5] = [
        ([1, 1, 4, 4], [2, 2], None),
        ([1, 1, 2, 2], [4, 4], Some(2.0)),
        ([2, 3, 9, 13], [9, 13], None),
        ([2, 3, 5, 7], [11, 3], None),
        ([1, 2, 3, 4], [3, 2], None),
    ];
    for (shape, size, scale) in cases {
        let data: Vec<f32> = (0..shape.iter().product::<usize>()).map(|v| v as f32).collect();
        let host = gems.tensor(shape, data.clone()).unwrap();
        let expected = upsample_nearest2d(&gems, &host, &size, scale, scale).unwrap();

        let input = to_device(&data, shape.to_vec(), runtime).unwrap();
        let output = upsample_nearest2d_execute::<R, f32>(&input, &size, scale, scale, &tuner, runtime).unwrap();
        assert_eq!(output.shape(), expected.shape());
        let result: Vec<f32> = to_cpu(&output, runtime).unwrap();
        assert_eq!(result, expected.to_vec(), "{shape:?} -> {size:?}");
    }

    let before = tuner.benchmarks();
    let input = to_device(&[0.0f32; 16], vec![1, 1, 4, 4], runtime).unwrap();
    upsample_nearest2d_execute::<R, f32>(&input, &[2, 2], None, None, &tuner, runtime).unwrap();
    assert_eq!(tuner.benchmarks(), before);

    let flat = to_device(&[0.0f32; 16], vec![4, 4], runtime).unwrap();
    let err = upsample_nearest2d_execute::<R, f32>(&flat, &[2, 2], None, None, &tuner, runtime)
        .err()
        .unwrap();
    assert!(err.is_contract_violation());
}

fn check_binary<R: CubeclRuntime>(runtime: &RuntimeContext<R>) {
    let size = 10_000;
    let a: Vec<f32> = (0..size).map(|i| i as f32).collect();
    let b: Vec<f32> = (0..size).map(|i| (i % 17) as f32 + 1.0).collect();
    let a_gpu = to_device(&a, vec![size], runtime).unwrap();
    let b_gpu = to_device(&b, vec![size], runtime).unwrap();
    let out_gpu = allocate::<_, f32>(vec![size], runtime).unwrap();

    add_execute(&a_gpu, &b_gpu, 2.0f32, &out_gpu, runtime).unwrap();
    let result: Vec<f32> = to_cpu(&out_gpu, runtime).unwrap();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + 2.0 * y).collect();
    assert!(vec_approx_eq(&result, &expected));

    sub_execute(&a_gpu, &b_gpu, 1.0f32, &out_gpu, runtime).unwrap();
    let result: Vec<f32> = to_cpu(&out_gpu, runtime).unwrap();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
    assert!(vec_approx_eq(&result, &expected));

    mul_execute::<_, f32>(&a_gpu, &b_gpu, &out_gpu, runtime).unwrap();
    let result: Vec<f32> = to_cpu(&out_gpu, runtime).unwrap();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x * y).collect();
    assert!(vec_approx_eq(&result, &expected));

    div_execute::<_, f32>(&a_gpu, &b_gpu, &out_gpu, runtime).unwrap();
    let result: Vec<f32> = to_cpu(&out_gpu, runtime).unwrap();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x / y).collect();
    assert!(vec_approx_eq(&result, &expected));

    let short = to_device(&[1.0f32; 3], vec![3], runtime).unwrap();
    let err = add_execute(&a_gpu, &short, 1.0f32, &out_gpu, runtime).unwrap_err();
    assert!(err.is_contract_violation());
}

fn check_reductions<R: CubeclRuntime>(runtime: &RuntimeContext<R>) {
    let data: Vec<f32> = (0..5000).map(|v| ((v * 37) % 101) as f32 - 50.0).collect();
    let input = to_device(&data, vec![5000], runtime).unwrap();

    let total: f32 = sum_execute(&input, runtime).unwrap();
    assert_eq!(total, data.iter().sum::<f32>());
    let lo: f32 = amin_execute(&input, runtime).unwrap();
    let hi: f32 = amax_execute(&input, runtime).unwrap();
    assert_eq!(lo, -50.0);
    assert_eq!(hi, 50.0);
}

#[cfg(feature = "cuda")]
mod cuda_tests {
    use super::*;

    #[test]
    fn test_nearest_matches_host() {
        let Ok(runtime) = init_cuda_runtime() else { return };
        check_nearest(&runtime);
    }

    #[test]
    fn test_binary_ops() {
        let Ok(runtime) = init_cuda_runtime() else { return };
        check_binary(&runtime);
    }

    #[test]
    fn test_reductions() {
        let Ok(runtime) = init_cuda_runtime() else { return };
        check_reductions(&runtime);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu_tests {
    use super::*;

    #[test]
    fn test_nearest_matches_host() {
        let Ok(runtime) = init_wgpu_runtime() else { return };
        check_nearest(&runtime);
    }

    #[test]
    fn test_binary_ops() {
        let Ok(runtime) = init_wgpu_runtime() else { return };
        check_binary(&runtime);
    }

    #[test]
    fn test_reductions() {
        let Ok(runtime) = init_wgpu_runtime() else { return };
        check_reductions(&runtime);
    }
}
