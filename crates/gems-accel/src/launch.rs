//! Launch configurations and the lane-pool executor.
//!
//! A launch splits a destination buffer into `block_size` chunks, one per
//! execution unit, and runs the units on a pool of `lanes` workers. Each unit
//! receives its program id and exclusive access to its own chunk, so units
//! never write to the same element and need no synchronisation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{GemsError, Result};
use crate::index::cdiv;

/// Execution configuration chosen by the autotuner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchConfig {
    /// Work items (or rows, or tiles) per execution unit.
    pub block_size: usize,
    /// Parallel lanes executing units.
    pub lanes: usize,
}

impl LaunchConfig {
    /// Create a configuration.
    pub fn new(block_size: usize, lanes: usize) -> Self {
        Self { block_size, lanes }
    }

    /// Cross product of block sizes and lane counts, block-major.
    pub fn cross(block_sizes: &[usize], lanes: &[usize]) -> Vec<Self> {
        block_sizes
            .iter()
            .flat_map(|&b| lanes.iter().map(move |&l| Self::new(b, l)))
            .collect()
    }

    /// Units needed to cover `total` items.
    pub fn grid(&self, total: usize) -> usize {
        cdiv(total, self.block_size)
    }
}

impl fmt::Display for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BLOCK_SIZE={} lanes={}", self.block_size, self.lanes)
    }
}

/// Worker pools, one per lane count, built on first use.
#[derive(Default)]
pub(crate) struct LanePools {
    pools: Mutex<HashMap<usize, Arc<ThreadPool>>>,
}

impl LanePools {
    pub(crate) fn get(&self, lanes: usize) -> Result<Arc<ThreadPool>> {
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pools.get(&lanes) {
            return Ok(Arc::clone(pool));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(lanes)
            .thread_name(move |i| format!("gems-lane{lanes}-{i}"))
            .build()
            .map_err(|e| GemsError::KernelLaunchFailed(format!("cannot start {lanes} lanes: {e}")))?;
        let pool = Arc::new(pool);
        pools.insert(lanes, Arc::clone(&pool));
        Ok(pool)
    }
}

impl fmt::Debug for LanePools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lanes: Vec<_> = pools.keys().copied().collect();
        lanes.sort_unstable();
        f.debug_struct("LanePools").field("lanes", &lanes).finish()
    }
}

/// Run `kernel(pid, block)` over `dst` split into `block_size` chunks.
pub(crate) fn launch_blocks<T, K>(pool: &ThreadPool, dst: &mut [T], block_size: usize, kernel: K)
where
    T: Send,
    K: Fn(usize, &mut [T]) + Sync,
{
    pool.install(|| {
        dst.par_chunks_mut(block_size)
            .enumerate()
            .for_each(|(pid, block)| kernel(pid, block));
    });
}

/// Run `kernel(pid, a_block, b_block)` over two outputs partitioned in lockstep.
///
/// Both buffers must split into the same number of units.
pub(crate) fn launch_block_pairs<A, B, K>(
    pool: &ThreadPool,
    a: &mut [A],
    block_a: usize,
    b: &mut [B],
    block_b: usize,
    kernel: K,
) -> Result<()>
where
    A: Send,
    B: Send,
    K: Fn(usize, &mut [A], &mut [B]) + Sync,
{
    let (units_a, units_b) = (cdiv(a.len(), block_a), cdiv(b.len(), block_b));
    if units_a != units_b {
        return Err(GemsError::KernelLaunchFailed(format!(
            "paired outputs disagree on grid size: {units_a} vs {units_b}"
        )));
    }
    pool.install(|| {
        a.par_chunks_mut(block_a)
            .zip(b.par_chunks_mut(block_b))
            .enumerate()
            .for_each(|(pid, (x, y))| kernel(pid, x, y));
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_product_order() {
        let configs = LaunchConfig::cross(&[1024, 2048], &[4, 8]);
        assert_eq!(
            configs,
            vec![
                LaunchConfig::new(1024, 4),
                LaunchConfig::new(1024, 8),
                LaunchConfig::new(2048, 4),
                LaunchConfig::new(2048, 8),
            ]
        );
        assert_eq!(configs[0].grid(3000), 3);
        assert_eq!(configs[3].grid(2048), 1);
    }

    #[test]
    fn test_units_own_disjoint_blocks() {
        let pools = LanePools::default();
        let pool = pools.get(3).unwrap();
        let mut dst = vec![usize::MAX; 10];
        launch_blocks(&pool, &mut dst, 4, |pid, block| {
            for (lane, out) in block.iter_mut().enumerate() {
                *out = pid * 4 + lane;
            }
        });
        assert_eq!(dst, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_pair_launch_requires_matching_grids() {
        let pools = LanePools::default();
        let pool = pools.get(2).unwrap();
        let mut a = vec![0u8; 8];
        let mut b = vec![0u8; 3];
        assert!(launch_block_pairs(&pool, &mut a, 4, &mut b, 1, |_, _, _| {}).is_err());

        let mut b = vec![0u8; 2];
        launch_block_pairs(&pool, &mut a, 4, &mut b, 1, |pid, x, y| {
            x.fill(pid as u8 + 1);
            y[0] = pid as u8;
        })
        .unwrap();
        assert_eq!(a, vec![1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(b, vec![0, 1]);
    }

    #[test]
    fn test_pools_are_reused() {
        let pools = LanePools::default();
        let a = pools.get(2).unwrap();
        let b = pools.get(2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.current_num_threads(), 2);
    }
}
