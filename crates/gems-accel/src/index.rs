//! Index decomposition shared by every flat kernel.
//!
//! A kernel iterates flattened output indices; these helpers recover the
//! multi-dimensional coordinates (or a source offset) from a flat index.
//! All divisions truncate.

use std::ops::Range;

use crate::error::{GemsError, Result};

/// Decompose a flat NCHW index into `[n, c, h, w]`.
///
/// Width varies fastest, then height, channel and batch. For `idx` beyond
/// `N*C*H*W` the result wraps; callers mask such indices before any access.
#[inline]
pub fn decompose_nchw(idx: usize, [n, c, h, w]: [usize; 4]) -> [usize; 4] {
    let ow = idx % w;
    let oh = idx / w % h;
    let oc = idx / w / h % c;
    let on = idx / w / h / c % n;
    [on, oc, oh, ow]
}

/// Row-major strides of a contiguous tensor.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Result shape of broadcasting `a` against `b` (NumPy rules).
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let da = if i + a.len() >= ndim { a[i + a.len() - ndim] } else { 1 };
        let db = if i + b.len() >= ndim { b[i + b.len() - ndim] } else { 1 };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(GemsError::contract(format!(
                    "shapes {a:?} and {b:?} are not broadcastable (dim {i}: {da} vs {db})"
                )))
            }
        };
    }
    Ok(out)
}

/// Strides that read `src_shape` as if it had `out_shape` (0 on broadcast axes).
///
/// `src_shape` must be broadcastable to `out_shape`.
pub fn broadcast_strides(src_shape: &[usize], out_shape: &[usize]) -> Vec<usize> {
    let src_strides = contiguous_strides(src_shape);
    let lead = out_shape.len() - src_shape.len();
    (0..out_shape.len())
        .map(|d| {
            if d < lead || src_shape[d - lead] == 1 {
                0
            } else {
                src_strides[d - lead]
            }
        })
        .collect()
}

/// Maps a flat output index to a source offset through N-d decomposition.
#[derive(Debug, Clone)]
pub struct StridedIndexer {
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl StridedIndexer {
    /// Indexer reading `src_shape` broadcast to `out_shape`.
    pub fn broadcast(src_shape: &[usize], out_shape: &[usize]) -> Self {
        Self {
            shape: out_shape.to_vec(),
            strides: broadcast_strides(src_shape, out_shape),
        }
    }

    /// Source offset of flat output index `idx`.
    #[inline]
    pub fn offset(&self, mut idx: usize) -> usize {
        let mut offset = 0;
        for (&extent, &stride) in self.shape.iter().zip(&self.strides).rev() {
            offset += idx % extent * stride;
            idx /= extent;
        }
        offset
    }
}

/// The masked index range owned by one execution unit.
///
/// A launch over-provisions units to the next multiple of `block_size`; the
/// last unit's range is clipped at `total` so no index past the end is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRange {
    /// First flat index of the unit.
    pub offset: usize,
    /// One past the last valid flat index of the unit.
    pub end: usize,
}

impl UnitRange {
    /// Range of program `pid` over `total` items in blocks of `block_size`.
    #[inline]
    pub fn new(pid: usize, block_size: usize, total: usize) -> Self {
        let offset = pid * block_size;
        let end = offset.saturating_add(block_size).min(total);
        Self {
            offset: offset.min(end),
            end,
        }
    }

    /// Valid indices of the unit.
    #[inline]
    pub fn indices(&self) -> Range<usize> {
        self.offset..self.end
    }

    /// Number of valid indices.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.offset
    }

    /// Check if the unit lies entirely past the end.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offset == self.end
    }
}

/// `ceil(a / b)`.
#[inline]
pub fn cdiv(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_is_row_major_bijection() {
        let shape = [2, 3, 4, 5];
        let total: usize = shape.iter().product();
        for idx in 0..total {
            let [n, c, h, w] = decompose_nchw(idx, shape);
            assert_eq!(((n * 3 + c) * 4 + h) * 5 + w, idx);
        }
        assert_eq!(decompose_nchw(7, [1, 1, 2, 4]), [0, 0, 1, 3]);
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[4, 1, 3], &[2, 1]).unwrap(), vec![4, 2, 3]);
        assert_eq!(broadcast_shapes(&[], &[5]).unwrap(), vec![5]);
        assert!(broadcast_shapes(&[2, 3], &[4]).is_err());
    }

    #[test]
    fn test_strided_indexer_broadcasts() {
        // a row vector [3] read as [2, 3]
        let idx = StridedIndexer::broadcast(&[3], &[2, 3]);
        let offsets: Vec<usize> = (0..6).map(|i| idx.offset(i)).collect();
        assert_eq!(offsets, vec![0, 1, 2, 0, 1, 2]);

        // a column [2, 1] read as [2, 3]
        let idx = StridedIndexer::broadcast(&[2, 1], &[2, 3]);
        let offsets: Vec<usize> = (0..6).map(|i| idx.offset(i)).collect();
        assert_eq!(offsets, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_unit_range_masks_tail() {
        assert_eq!(UnitRange::new(0, 4, 10).indices(), 0..4);
        assert_eq!(UnitRange::new(2, 4, 10).indices(), 8..10);
        assert!(UnitRange::new(3, 4, 10).is_empty());
        assert_eq!(cdiv(10, 4), 3);
        assert_eq!(cdiv(0, 4), 0);
    }
}
