//! Launch-configuration autotuning.
//!
//! An [`Autotuner`] owns a fixed candidate set of [`LaunchConfig`]s and a cache
//! from problem key to the fastest candidate measured for that key. The first
//! request for a key benchmarks every candidate on the caller's real data;
//! later requests return the cached winner without measuring.
//!
//! Population is serialised per key: concurrent first requests for the same
//! key block on one cell while a single caller benchmarks, and requests for
//! other keys proceed. The map lock itself is only held for the lookup or
//! insertion of a key's cell, never while a benchmark runs.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::config::GemsConfig;
use crate::error::{GemsError, Result};
use crate::launch::LaunchConfig;

/// How candidates are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneSettings {
    /// Benchmark candidates; when off the first candidate is cached unmeasured.
    pub enabled: bool,
    /// Untimed runs per candidate.
    pub warmup: usize,
    /// Timed runs per candidate; the minimum is kept.
    pub reps: usize,
}

impl From<&GemsConfig> for TuneSettings {
    fn from(config: &GemsConfig) -> Self {
        Self {
            enabled: config.autotune,
            warmup: config.warmup,
            reps: config.reps.max(1),
        }
    }
}

/// Per-key cache of the fastest launch configuration of one kernel family.
pub struct Autotuner<K> {
    name: &'static str,
    candidates: Vec<LaunchConfig>,
    settings: TuneSettings,
    cache: RwLock<HashMap<K, Arc<OnceCell<LaunchConfig>>>>,
    benchmarks: AtomicUsize,
}

impl<K> Autotuner<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an autotuner over `candidates`.
    ///
    /// # Panics
    ///
    /// An empty candidate set, or a candidate with zero block size or lanes,
    /// is a startup misconfiguration and panics.
    pub fn new(name: &'static str, candidates: Vec<LaunchConfig>, settings: TuneSettings) -> Self {
        assert!(!candidates.is_empty(), "autotuner `{name}` has no candidate configurations");
        assert!(
            candidates.iter().all(|c| c.block_size > 0 && c.lanes > 0),
            "autotuner `{name}` has a zero-sized candidate: {candidates:?}"
        );
        Self {
            name,
            candidates,
            settings,
            cache: RwLock::new(HashMap::new()),
            benchmarks: AtomicUsize::new(0),
        }
    }

    /// Name of the tuned kernel family.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Candidate configurations.
    pub fn candidates(&self) -> &[LaunchConfig] {
        &self.candidates
    }

    /// Cached configuration for `key`, if it was already tuned.
    pub fn cached(&self, key: &K) -> Option<LaunchConfig> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).and_then(|cell| cell.get().copied())
    }

    /// Number of keys that were benchmarked.
    pub fn benchmarks(&self) -> usize {
        self.benchmarks.load(Ordering::Acquire)
    }

    /// Number of keys with a cached configuration.
    pub fn len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.values().filter(|cell| cell.get().is_some()).count()
    }

    /// Check if nothing has been tuned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configuration for `key`, benchmarking `run` over every candidate on a miss.
    ///
    /// `run` executes the kernel with a given configuration. Candidates whose
    /// run fails are excluded; if all fail, the last failure is returned
    /// wrapped in [`GemsError::AutotuneFailed`] and nothing is cached.
    pub fn select<F>(&self, key: K, mut run: F) -> Result<LaunchConfig>
    where
        F: FnMut(LaunchConfig) -> Result<()>,
    {
        let cell = self.cell(&key);
        if let Some(config) = cell.get() {
            log::trace!("autotune {}: cache hit {:?} -> {}", self.name, key, config);
            return Ok(*config);
        }
        cell.get_or_try_init(|| -> Result<LaunchConfig> {
            let config = if self.settings.enabled {
                self.benchmark(&key, &mut run)?
            } else {
                self.candidates[0]
            };
            log::debug!("autotune {}: {:?} -> {}", self.name, key, config);
            Ok(config)
        })
        .copied()
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<LaunchConfig>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = cache.get(key) {
                return Arc::clone(cell);
            }
        }
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key.clone()).or_default())
    }

    fn benchmark<F>(&self, key: &K, run: &mut F) -> Result<LaunchConfig>
    where
        F: FnMut(LaunchConfig) -> Result<()>,
    {
        self.benchmarks.fetch_add(1, Ordering::AcqRel);
        let mut best: Option<(LaunchConfig, Duration)> = None;
        let mut last_err = None;
        for &candidate in &self.candidates {
            match self.measure(candidate, run) {
                Ok(elapsed) => {
                    log::trace!("autotune {}: {:?} {} took {:?}", self.name, key, candidate, elapsed);
                    if best.map_or(true, |(_, t)| elapsed < t) {
                        best = Some((candidate, elapsed));
                    }
                }
                Err(err) => {
                    log::warn!("autotune {}: {:?} excluding {}: {}", self.name, key, candidate, err);
                    last_err = Some(err);
                }
            }
        }
        match (best, last_err) {
            (Some((config, _)), _) => Ok(config),
            (None, Some(err)) => Err(GemsError::AutotuneFailed {
                kernel: self.name,
                source: Box::new(err),
            }),
            (None, None) => unreachable!("candidate set is non-empty"),
        }
    }

    fn measure<F>(&self, candidate: LaunchConfig, run: &mut F) -> Result<Duration>
    where
        F: FnMut(LaunchConfig) -> Result<()>,
    {
        for _ in 0..self.settings.warmup {
            run(candidate)?;
        }
        let mut fastest = Duration::MAX;
        for _ in 0..self.settings.reps.max(1) {
            let start = Instant::now();
            run(candidate)?;
            fastest = fastest.min(start.elapsed());
        }
        Ok(fastest)
    }
}

impl<K> Debug for Autotuner<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autotuner")
            .field("name", &self.name)
            .field("candidates", &self.candidates)
            .field("settings", &self.settings)
            .field("benchmarks", &self.benchmarks.load(Ordering::Relaxed))
            .finish()
    }
}

/// Resize kernels are keyed on `(mode, [N, C, OH, OW], [same_h, same_w])`.
///
/// The same-extent flags select a separately monomorphised kernel, so each
/// flag combination is tuned on its own.
pub type ResizeKey = (&'static str, [usize; 4], [bool; 2]);
/// Flat kernels are keyed on `(op, numel bucket)`.
pub type FlatKey = (&'static str, usize);
/// Row-wise kernels are keyed on `(op, rows, row length)`.
pub type RowKey = (&'static str, usize, usize);
/// Matrix multiply is keyed on `[B, M, N, K]`.
pub type MatmulKey = [usize; 4];

/// The autotune caches of every kernel family.
///
/// Owned by a [`Gems`](crate::Gems) context; share one between contexts with
/// [`Gems::with_cache`](crate::Gems::with_cache) or give each test its own.
#[derive(Debug)]
pub struct TuneCache {
    /// Nearest, nearest-exact and bilinear resize.
    pub resize: Autotuner<ResizeKey>,
    /// Unary, binary and shape-preserving pointwise kernels.
    pub pointwise: Autotuner<FlatKey>,
    /// Whole-tensor reductions.
    pub reduction: Autotuner<FlatKey>,
    /// Softmax, layer_norm and cumsum.
    pub rowwise: Autotuner<RowKey>,
    /// mm, bmm and addmm.
    pub matmul: Autotuner<MatmulKey>,
}

impl TuneCache {
    /// Fresh, empty caches with candidates taken from `config`.
    pub fn new(config: &GemsConfig) -> Self {
        let settings = TuneSettings::from(config);
        let flat = LaunchConfig::cross(&config.block_sizes, &config.lanes);
        Self {
            resize: Autotuner::new("resize", flat.clone(), settings),
            pointwise: Autotuner::new("pointwise", flat.clone(), settings),
            reduction: Autotuner::new("reduction", flat, settings),
            rowwise: Autotuner::new(
                "rowwise",
                LaunchConfig::cross(&config.rows_per_unit, &config.lanes),
                settings,
            ),
            matmul: Autotuner::new(
                "matmul",
                LaunchConfig::cross(&config.matmul_tile_rows, &config.lanes),
                settings,
            ),
        }
    }

    /// Total number of keys benchmarked across all families.
    pub fn benchmarks(&self) -> usize {
        self.resize.benchmarks()
            + self.pointwise.benchmarks()
            + self.reduction.benchmarks()
            + self.rowwise.benchmarks()
            + self.matmul.benchmarks()
    }
}

/// Power-of-two bucket of an element count, used in flat kernel keys.
pub fn numel_bucket(numel: usize) -> usize {
    numel.max(1).next_power_of_two()
}
