//! Resize kernel bodies over NCHW tensors.
//!
//! Each body runs once per execution unit. The unit covers `block_size`
//! flattened output indices, decomposes every index into `(n, c, oh, ow)`,
//! maps the spatial coordinates back to the source with a [`CoordinateMap`]
//! per axis and gathers from the source buffer.

use crate::dtype::{Element, FloatElement};
use crate::index::{decompose_nchw, UnitRange};

/// Maps an output coordinate along one axis to the source coordinate it reads.
///
/// Implementors are zero-sized policies chosen once per launch, so the choice
/// between them never branches inside the per-item loop.
pub trait CoordinateMap: Copy + Send + Sync + 'static {
    /// Source coordinate of output coordinate `out`, clamped to `[0, in_extent - 1]`.
    fn source(out: usize, in_extent: usize, reciprocal: f32) -> usize;
}

/// Same-extent passthrough: the source coordinate is the output coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

/// Nearest-neighbour rounding down: `min(floor(out * r), in - 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFloor;

/// Nearest-neighbour on pixel centres: `min(floor((out + 0.5) * r), in - 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestExact;

impl CoordinateMap for Identity {
    #[inline(always)]
    fn source(out: usize, _in_extent: usize, _reciprocal: f32) -> usize {
        out
    }
}

impl CoordinateMap for NearestFloor {
    #[inline(always)]
    fn source(out: usize, in_extent: usize, reciprocal: f32) -> usize {
        // float-to-int casts truncate, and the operand is never negative
        let src = (out as f32 * reciprocal).floor() as usize;
        src.min(in_extent - 1)
    }
}

impl CoordinateMap for NearestExact {
    #[inline(always)]
    fn source(out: usize, in_extent: usize, reciprocal: f32) -> usize {
        let src = ((out as f32 + 0.5) * reciprocal).floor() as usize;
        src.min(in_extent - 1)
    }
}

/// Reciprocal scale of one axis: `1 / scale` when given, else `in / out`.
///
/// Both paths produce the `f32` the kernel consumes, so an explicit scale equal
/// to the size ratio yields bit-identical coordinates.
pub fn reciprocal_scale(in_extent: usize, out_extent: usize, scale: Option<f64>) -> f32 {
    match scale {
        Some(s) => (1.0 / s) as f32,
        None => in_extent as f32 / out_extent as f32,
    }
}

/// Whether an axis takes the passthrough mapping.
///
/// Equal extents copy through even when an explicit scale is given.
pub fn same_extent(in_extent: usize, out_extent: usize) -> bool {
    in_extent == out_extent
}

/// Shape parameters and reciprocal scales of one resize launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeParams {
    /// Batch count.
    pub n: usize,
    /// Channel count.
    pub c: usize,
    /// Input height.
    pub ih: usize,
    /// Input width.
    pub iw: usize,
    /// Output height.
    pub oh: usize,
    /// Output width.
    pub ow: usize,
    /// Reciprocal scale along height.
    pub rh: f32,
    /// Reciprocal scale along width.
    pub rw: f32,
}

impl ResizeParams {
    /// Output extents `[N, C, OH, OW]`.
    #[inline]
    pub fn out_shape(&self) -> [usize; 4] {
        [self.n, self.c, self.oh, self.ow]
    }

    /// Total work items, one per output element.
    ///
    /// Parameters built by the launchers are checked to not overflow.
    #[inline]
    pub fn total(&self) -> usize {
        self.n * self.c * self.oh * self.ow
    }

    #[inline(always)]
    fn src_offset(&self, n: usize, c: usize, ih: usize, iw: usize) -> usize {
        ((n * self.c + c) * self.ih + ih) * self.iw + iw
    }
}

/// Nearest-neighbour gather of one execution unit.
///
/// `dst` is the unit's block of the destination, starting at flat output
/// index `pid * block_size`; `H` and `W` are the per-axis mappings.
pub fn nearest_unit<T, H, W>(pid: usize, dst: &mut [T], src: &[T], params: &ResizeParams, block_size: usize)
where
    T: Element,
    H: CoordinateMap,
    W: CoordinateMap,
{
    let range = UnitRange::new(pid, block_size, params.total());
    let shape = params.out_shape();
    for (out, idx) in dst.iter_mut().zip(range.indices()) {
        let [n, c, oh, ow] = decompose_nchw(idx, shape);
        let ih = H::source(oh, params.ih, params.rh);
        let iw = W::source(ow, params.iw, params.rw);
        *out = src[params.src_offset(n, c, ih, iw)];
    }
}

/// Source coordinate and interpolation weight of one bilinear axis.
#[inline(always)]
fn bilinear_axis(out: usize, in_extent: usize, reciprocal: f32, align_corners: bool) -> (usize, usize, f32) {
    let src = if align_corners {
        out as f32 * reciprocal
    } else {
        ((out as f32 + 0.5) * reciprocal - 0.5).max(0.0)
    };
    let i0 = (src.floor() as usize).min(in_extent - 1);
    let i1 = if i0 + 1 < in_extent { i0 + 1 } else { i0 };
    let lambda = (src - i0 as f32).clamp(0.0, 1.0);
    (i0, i1, lambda)
}

/// Bilinear interpolation of one execution unit.
///
/// With `align_corners` the reciprocals are `(in - 1) / (out - 1)` (zero for a
/// single output pixel); otherwise they are the nearest-mode reciprocals.
pub fn bilinear_unit<T: FloatElement>(
    pid: usize,
    dst: &mut [T],
    src: &[T],
    params: &ResizeParams,
    align_corners: bool,
    block_size: usize,
) {
    let range = UnitRange::new(pid, block_size, params.total());
    let shape = params.out_shape();
    for (out, idx) in dst.iter_mut().zip(range.indices()) {
        let [n, c, oh, ow] = decompose_nchw(idx, shape);
        let (h0, h1, lh) = bilinear_axis(oh, params.ih, params.rh, align_corners);
        let (w0, w1, lw) = bilinear_axis(ow, params.iw, params.rw, align_corners);
        let (lh1, lw1) = (T::from_f64(lh as f64), T::from_f64(lw as f64));
        let (lh0, lw0) = (T::one() - lh1, T::one() - lw1);
        let at = |h, w| src[params.src_offset(n, c, h, w)];
        *out = lh0 * (lw0 * at(h0, w0) + lw1 * at(h0, w1)) + lh1 * (lw0 * at(h1, w0) + lw1 * at(h1, w1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ih: usize, iw: usize, oh: usize, ow: usize) -> ResizeParams {
        ResizeParams {
            n: 1,
            c: 1,
            ih,
            iw,
            oh,
            ow,
            rh: reciprocal_scale(ih, oh, None),
            rw: reciprocal_scale(iw, ow, None),
        }
    }

    #[test]
    fn test_nearest_floor_rounds_down() {
        assert_eq!(NearestFloor::source(1, 4, 2.0), 2);
        assert_eq!(NearestFloor::source(3, 2, 0.5), 1);
        // 2.999.. must not round up to 3
        assert_eq!(NearestFloor::source(1, 8, 2.999), 2);
        assert_eq!(NearestFloor::source(9, 4, 1.0), 3);
    }

    #[test]
    fn test_identity_matches_general_formula() {
        let r = reciprocal_scale(37, 37, None);
        assert!(same_extent(37, 37));
        for o in 0..37 {
            assert_eq!(Identity::source(o, 37, r), NearestFloor::source(o, 37, r));
        }
        assert!(!same_extent(4, 8));
    }

    #[test]
    fn test_equal_extents_ignore_explicit_scale() {
        let mut p = params(1, 4, 1, 4);
        p.rw = reciprocal_scale(4, 4, Some(2.0));
        assert!(same_extent(p.iw, p.ow));
        let src = [0.0f32, 1.0, 2.0, 3.0];
        let mut dst = [f32::NAN; 4];
        nearest_unit::<f32, Identity, Identity>(0, &mut dst, &src, &p, 4);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_explicit_and_derived_reciprocal_agree() {
        assert_eq!(reciprocal_scale(3, 6, Some(2.0)), reciprocal_scale(3, 6, None));
        assert_eq!(reciprocal_scale(4, 2, None), 2.0);
    }

    #[test]
    fn test_nearest_unit_masks_tail() {
        let src: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let p = params(4, 4, 2, 2);
        // last unit of a block-3 grid over 4 items holds a single element
        let mut dst = [f32::NAN; 1];
        nearest_unit::<f32, NearestFloor, NearestFloor>(1, &mut dst, &src, &p, 3);
        assert_eq!(dst, [10.0]);
    }

    #[test]
    fn test_bilinear_align_corners_endpoints() {
        let src = [0.0f64, 1.0, 2.0, 3.0];
        let mut p = params(2, 2, 3, 3);
        p.rh = 0.5;
        p.rw = 0.5;
        let mut dst = [0.0f64; 9];
        bilinear_unit(0, &mut dst, &src, &p, true, 9);
        assert_eq!(dst, [0.0, 0.5, 1.0, 1.0, 1.5, 2.0, 2.0, 2.5, 3.0]);
    }
}
