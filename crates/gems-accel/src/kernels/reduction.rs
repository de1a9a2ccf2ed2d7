//! Reduction and scan kernel bodies.
//!
//! Whole-tensor reductions run in two phases: every unit folds its block of
//! the input into one partial, written to its own slot, and the launcher
//! combines the partials on the host. Scans give each unit whole slabs of
//! the tensor so the running value never crosses a unit boundary.

use crate::dtype::NumElement;
use crate::index::UnitRange;

/// Fold the unit's block of `src` into its partial slot.
///
/// The partial buffer is launched with one slot per unit. A unit whose block
/// lies past the end of `src` leaves its slot untouched.
pub fn partial_unit<T, F>(pid: usize, slot: &mut [T], src: &[T], block_size: usize, combine: F)
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let range = UnitRange::new(pid, block_size, src.len());
    let mut values = src[range.indices()].iter().copied();
    if let (Some(out), Some(first)) = (slot.first_mut(), values.next()) {
        *out = values.fold(first, &combine);
    }
}

/// Smaller of two values; NaN wins over any number.
#[inline]
#[allow(clippy::eq_op)]
pub fn min_propagate<T: PartialOrd + Copy>(a: T, b: T) -> T {
    // NaN is the only value unequal to itself
    if a != a {
        a
    } else if b != b || b < a {
        b
    } else {
        a
    }
}

/// Larger of two values; NaN wins over any number.
#[inline]
#[allow(clippy::eq_op)]
pub fn max_propagate<T: PartialOrd + Copy>(a: T, b: T) -> T {
    if a != a {
        a
    } else if b != b || b > a {
        b
    } else {
        a
    }
}

/// Inclusive prefix sum along the middle axis of `[outer, dim_len, inner]` slabs.
///
/// `dst` holds whole slabs; the unit's first slab is `pid * slabs_per_unit`.
pub fn cumsum_unit<T: NumElement>(
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
            let mut acc = T::ZERO;
            for k in 0..dim_len {
                acc = acc.wrapping_add(src[k * inner + j]);
                slab[k * inner + j] = acc;
            }
        }
    }
}
