//! CubeCL kernel bodies.

// CubeCL's #[cube] macro generates additional code that doesn't have docs
#![allow(missing_docs)]

use cubecl::prelude::*;

/// Nearest-neighbour resize over a flattened NCHW output.
///
/// `h_index[oh]` and `w_index[ow]` hold the source row and column read by
/// every output row and column. The host builds them with the same
/// coordinate maps as the CPU kernel, same-extent axes included, so both
/// backends gather the same pixels.
///
/// # Thread Model
///
/// - Cube `CUBE_POS` owns outputs `[CUBE_POS * block_size, (CUBE_POS + 1) * block_size)`
/// - Units of the cube stride through the block by `CUBE_DIM_X`
/// - Indices past the end of `dst` are masked
#[cube(launch_unchecked)]
pub fn upsample_nearest2d_kernel<F: Float>(
    src: &Array<F>,
    dst: &mut Array<F>,
    h_index: &Array<u32>,
    w_index: &Array<u32>,
    ih: u32,
    iw: u32,
    oh: u32,
    ow: u32,
    block_size: u32,
) {
    let base = CUBE_POS * block_size;
    let total = dst.len();

    let mut i = UNIT_POS;
    while i < block_size {
        let idx = base + i;
        if idx < total {
            let w = idx % ow;
            let h = (idx / ow) % oh;
            let nc = idx / (ow * oh);
            dst[idx] = src[(nc * ih + h_index[h]) * iw + w_index[w]];
        }
        i += CUBE_DIM_X;
    }
}

/// `output[i] = a[i] + alpha * b[i]`
#[cube(launch_unchecked)]
pub fn add_kernel<F: Float>(a: &Array<F>, b: &Array<F>, alpha: F, output: &mut Array<F>) {
    let pos = ABSOLUTE_POS;
    if pos < output.len() {
        output[pos] = a[pos] + alpha * b[pos];
    }
}

/// `output[i] = a[i] - alpha * b[i]`
#[cube(launch_unchecked)]
pub fn sub_kernel<F: Float>(a: &Array<F>, b: &Array<F>, alpha: F, output: &mut Array<F>) {
    let pos = ABSOLUTE_POS;
    if pos < output.len() {
        output[pos] = a[pos] - alpha * b[pos];
    }
}

#[cube(launch_unchecked)]
pub fn mul_kernel<F: Float>(a: &Array<F>, b: &Array<F>, output: &mut Array<F>) {
    let pos = ABSOLUTE_POS;
    if pos < output.len() {
        output[pos] = a[pos] * b[pos];
    }
}

#[cube(launch_unchecked)]
pub fn div_kernel<F: Float>(a: &Array<F>, b: &Array<F>, output: &mut Array<F>) {
    let pos = ABSOLUTE_POS;
    if pos < output.len() {
        output[pos] = a[pos] / b[pos];
    }
}

/// First phase of a sum: unit `ABSOLUTE_POS` folds one block into its slot.
///
/// The host combines the partials.
#[cube(launch_unchecked)]
pub fn partial_sum_kernel<F: Float>(input: &Array<F>, partials: &mut Array<F>, block_size: u32) {
    let slot = ABSOLUTE_POS;
    if slot < partials.len() {
        let start = slot * block_size;
        let mut acc = F::new(0.0);
        let mut i: u32 = 0;
        while i < block_size {
            let idx = start + i;
            if idx < input.len() {
                acc = acc + input[idx];
            }
            i += 1;
        }
        partials[slot] = acc;
    }
}

/// First phase of a min; every slot covers at least one element.
#[cube(launch_unchecked)]
pub fn partial_min_kernel<F: Float>(input: &Array<F>, partials: &mut Array<F>, block_size: u32) {
    let slot = ABSOLUTE_POS;
    if slot < partials.len() {
        let start = slot * block_size;
        let mut acc = input[start];
        let mut i: u32 = 1;
        while i < block_size {
            let idx = start + i;
            if idx < input.len() {
                let v = input[idx];
                if v < acc {
                    acc = v;
                }
            }
            i += 1;
        }
        partials[slot] = acc;
    }
}

/// First phase of a max; every slot covers at least one element.
#[cube(launch_unchecked)]
pub fn partial_max_kernel<F: Float>(input: &Array<F>, partials: &mut Array<F>, block_size: u32) {
    let slot = ABSOLUTE_POS;
    if slot < partials.len() {
        let start = slot * block_size;
        let mut acc = input[start];
        let mut i: u32 = 1;
        while i < block_size {
            let idx = start + i;
            if idx < input.len() {
                let v = input[idx];
                if v > acc {
                    acc = v;
                }
            }
            i += 1;
        }
        partials[slot] = acc;
    }
}
