//! Counter-based random numbers and the dropout kernel body.
//!
//! Every element draws from a hash of `(seed, offset + index)` rather than
//! from a sequential generator, so the result does not depend on how the
//! tensor is split between units or lanes.

use crate::dtype::FloatElement;

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniform sample in `[0, 1)` for one counter of a stream.
#[inline]
pub fn uniform(seed: u64, counter: u64) -> f32 {
    let bits = splitmix64(seed ^ splitmix64(counter)) >> 40;
    bits as f32 * (1.0 / (1u64 << 24) as f32)
}

/// Dropout of one unit: an element is kept when its sample is at least `p`.
///
/// Kept elements are multiplied by `scale`, dropped ones are zero.
#[allow(clippy::too_many_arguments)]
pub fn dropout_unit<T: FloatElement>(
    pid: usize,
    out: &mut [T],
    mask: &mut [bool],
    src: &[T],
    p: f32,
    scale: T,
    (seed, offset): (u64, u64),
    block_size: usize,
) {
    let first = pid * block_size;
    for (i, (o, m)) in out.iter_mut().zip(mask.iter_mut()).enumerate() {
        let idx = first + i;
        let keep = uniform(seed, offset + idx as u64) >= p;
        *m = keep;
        *o = if keep { src[idx] * scale } else { T::zero() };
    }
}
