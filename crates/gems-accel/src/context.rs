//! The operator execution context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocator::{self, MemoryLedger, Storage};
use crate::autotune::TuneCache;
use crate::config::GemsConfig;
use crate::device::Device;
use crate::dtype::Element;
use crate::error::{GemsError, Result};
use crate::launch::{launch_block_pairs, launch_blocks, LanePools, LaunchConfig};
use crate::tensor::Tensor;

/// Everything an accelerated operator needs to run: the accelerator device,
/// its memory ledger and lane pools, the configuration and the autotune caches.
///
/// # Examples
///
/// ```
/// use gems_accel::{Gems, GemsConfig};
///
/// let gems = Gems::new(GemsConfig::default());
/// let x = gems.tensor([1, 1, 2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
/// let y = gems_accel::upsample_nearest2d(&gems, &x, &[4, 4], None, None).unwrap();
/// assert_eq!(y.shape(), &[1, 1, 4, 4]);
/// ```
#[derive(Debug)]
pub struct Gems {
    device: Device,
    config: GemsConfig,
    ledger: Arc<MemoryLedger>,
    pools: LanePools,
    tune_cache: Arc<TuneCache>,
    seed: u64,
    rng_offset: AtomicU64,
}

impl Gems {
    /// Create a context on the thread-pool accelerator with a fresh autotune cache.
    pub fn new(config: GemsConfig) -> Self {
        let cache = Arc::new(TuneCache::new(&config));
        Self::with_cache(config, cache)
    }

    /// Create a context configured from `GEMS_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(GemsConfig::from_env())
    }

    /// Create a context that shares an existing autotune cache.
    pub fn with_cache(config: GemsConfig, tune_cache: Arc<TuneCache>) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            device: Device::cpu(0),
            ledger: Arc::new(MemoryLedger::new(config.memory_limit)),
            pools: LanePools::default(),
            tune_cache,
            seed,
            rng_offset: AtomicU64::new(0),
            config,
        }
    }

    /// Device every operator of this context executes on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Configuration of the context.
    pub fn config(&self) -> &GemsConfig {
        &self.config
    }

    /// Memory ledger of the accelerator.
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Autotune caches.
    pub fn tune_cache(&self) -> &Arc<TuneCache> {
        &self.tune_cache
    }

    /// Copy a tensor onto the accelerator.
    pub fn upload<T: Element>(&self, tensor: &Tensor<T>) -> Result<Tensor<T>> {
        let storage = allocator::allocate_from(&self.ledger, tensor.as_slice())?;
        Ok(Tensor::from_storage(storage, tensor.shape().to_vec(), self.device))
    }

    /// Build a tensor on the accelerator from row-major host data.
    pub fn tensor<T: Element>(&self, shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Tensor<T>> {
        self.upload(&Tensor::from_vec(shape, data)?)
    }

    /// Fail unless `tensor` lives on this context's device.
    pub(crate) fn check_device<T: Element>(&self, tensor: &Tensor<T>) -> Result<()> {
        if tensor.device() != self.device {
            return Err(GemsError::DeviceMismatch {
                expected: self.device,
                actual: tensor.device(),
            });
        }
        Ok(())
    }

    pub(crate) fn alloc<T: Element>(&self, len: usize) -> Result<Storage<T>> {
        allocator::allocate(&self.ledger, len)
    }

    pub(crate) fn wrap<T: Element>(&self, storage: Storage<T>, shape: Vec<usize>) -> Tensor<T> {
        Tensor::from_storage(storage, shape, self.device)
    }

    /// Launch `kernel` over `dst` with the grid implied by `cfg`.
    pub(crate) fn launch<T, K>(&self, dst: &mut [T], cfg: LaunchConfig, kernel: K) -> Result<()>
    where
        T: Send,
        K: Fn(usize, &mut [T]) + Sync,
    {
        let pool = self.pools.get(cfg.lanes)?;
        launch_blocks(&pool, dst, cfg.block_size, kernel);
        Ok(())
    }

    /// Launch `kernel` over two outputs whose blocks are owned by the same unit.
    pub(crate) fn launch_pair<A, B, K>(
        &self,
        a: &mut [A],
        block_a: usize,
        b: &mut [B],
        block_b: usize,
        lanes: usize,
        kernel: K,
    ) -> Result<()>
    where
        A: Send,
        B: Send,
        K: Fn(usize, &mut [A], &mut [B]) + Sync,
    {
        let pool = self.pools.get(lanes)?;
        launch_block_pairs(&pool, a, block_a, b, block_b, kernel)
    }

    /// Seed and first counter of a random stream of `len` draws.
    pub(crate) fn rng_stream(&self, len: usize) -> (u64, u64) {
        let offset = self.rng_offset.fetch_add(len as u64, Ordering::AcqRel);
        (self.seed, offset)
    }
}

impl Default for Gems {
    fn default() -> Self {
        Self::new(GemsConfig::default())
    }
}
