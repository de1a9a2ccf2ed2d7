//! Row-wise kernel bodies: softmax and layer normalisation.
//!
//! Units own whole rows (or `[dim_len, inner]` slabs for softmax along an
//! inner axis), so every statistic a row needs is computed by one unit.

use crate::dtype::FloatElement;

/// Numerically stable softmax along the middle axis of `[outer, dim_len, inner]` slabs.
pub fn softmax_unit<T: FloatElement>(
    pid: usize,
    dst: &mut [T],
    src: &[T],
    dim_len: usize,
    inner: usize,
    slabs_per_unit: usize,
) {
    let slab_len = dim_len * inner;
    let base = pid * slabs_per_unit * slab_len;
    for (s, slab) in dst.chunks_mut(slab_len).enumerate() {
        let src = &src[base + s * slab_len..][..slab_len];
        for j in 0..inner {
            let column = (0..dim_len).map(|k| src[k * inner + j]);
            let max = column.clone().fold(T::neg_infinity(), T::max);
            let mut denom = T::zero();
            for (k, x) in column.enumerate() {
                let e = (x - max).exp();
                slab[k * inner + j] = e;
                denom = denom + e;
            }
            for k in 0..dim_len {
                slab[k * inner + j] = slab[k * inner + j] / denom;
            }
        }
    }
}

/// Mean and reciprocal standard deviation of whole rows.
///
/// `mean` and `rstd` hold one slot per row of the unit; the variance is biased.
pub fn layer_norm_stats_unit<T: FloatElement>(
    pid: usize,
    mean: &mut [T],
    rstd: &mut [T],
    src: &[T],
    row_len: usize,
    rows_per_unit: usize,
    eps: f64,
) {
    let first_row = pid * rows_per_unit;
    for (r, (m, s)) in mean.iter_mut().zip(rstd.iter_mut()).enumerate() {
        let row = &src[(first_row + r) * row_len..][..row_len];
        let n = row_len as f64;
        let mu = row.iter().map(|x| x.as_f64()).sum::<f64>() / n;
        let var = row.iter().map(|x| (x.as_f64() - mu).powi(2)).sum::<f64>() / n;
        *m = T::from_f64(mu);
        *s = T::from_f64(1.0 / (var + eps).sqrt());
    }
}

/// Normalise whole rows with precomputed statistics and an optional affine map.
#[allow(clippy::too_many_arguments)]
pub fn layer_norm_apply_unit<T: FloatElement>(
    pid: usize,
    dst: &mut [T],
    src: &[T],
    mean: &[T],
    rstd: &[T],
    weight: Option<&[T]>,
    bias: Option<&[T]>,
    row_len: usize,
    rows_per_unit: usize,
) {
    let first_row = pid * rows_per_unit;
    for (r, out) in dst.chunks_mut(row_len).enumerate() {
        let row = first_row + r;
        let x = &src[row * row_len..][..row_len];
        for (j, (o, &v)) in out.iter_mut().zip(x).enumerate() {
            let mut y = (v - mean[row]) * rstd[row];
            if let Some(w) = weight {
                y = y * w[j];
            }
            if let Some(b) = bias {
                y = y + b[j];
            }
            *o = y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let src = [1.0f64, 2.0, 3.0, 1000.0, 1000.0, 1000.0];
        let mut dst = [0.0; 6];
        softmax_unit(0, &mut dst, &src, 3, 1, 2);
        assert!((dst[..3].iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(dst[0] < dst[1] && dst[1] < dst[2]);
        // large logits must not overflow
        for v in &dst[3..] {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_layer_norm_row() {
        let src = [1.0f64, 2.0, 3.0, 4.0];
        let (mut mean, mut rstd) = ([0.0], [0.0]);
        layer_norm_stats_unit(0, &mut mean, &mut rstd, &src, 4, 1, 0.0);
        assert_eq!(mean[0], 2.5);
        assert!((rstd[0] - 1.0 / 1.25f64.sqrt()).abs() < 1e-12);

        let mut dst = [0.0; 4];
        layer_norm_apply_unit(0, &mut dst, &src, &mean, &rstd, None, Some(&[1.0; 4][..]), 4, 1);
        assert!((dst.iter().sum::<f64>() - 4.0).abs() < 1e-12);
    }
}
