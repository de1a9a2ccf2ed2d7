//! Launch and autotune configuration.
//!
//! Every knob has a compiled-in default and can be overridden through the
//! environment with [`GemsConfig::from_env`].

/// Candidate work-items per execution unit for flat (pointwise, resize, reduction) kernels.
pub const DEFAULT_BLOCK_SIZES: [usize; 2] = [1024, 2048];
/// Candidate lane counts (parallel workers per launch).
pub const DEFAULT_LANES: [usize; 2] = [4, 8];
/// Candidate rows per unit for row-wise kernels (softmax, layer_norm, cumsum).
pub const DEFAULT_ROWS_PER_UNIT: [usize; 2] = [1, 4];
/// Candidate output rows per tile for matrix multiply.
pub const DEFAULT_MATMUL_TILE_ROWS: [usize; 2] = [8, 32];
/// Untimed runs per candidate before measuring.
pub const DEFAULT_WARMUP: usize = 1;
/// Timed runs per candidate.
pub const DEFAULT_REPS: usize = 3;

/// Runtime configuration of a [`Gems`](crate::Gems) context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemsConfig {
    /// Candidate block sizes for flat kernels.
    pub block_sizes: Vec<usize>,
    /// Candidate lane counts.
    pub lanes: Vec<usize>,
    /// Candidate rows per unit for row-wise kernels.
    pub rows_per_unit: Vec<usize>,
    /// Candidate row tiles for matrix multiply.
    pub matmul_tile_rows: Vec<usize>,
    /// Measure candidates; when off the first candidate is cached unmeasured.
    pub autotune: bool,
    /// Untimed runs per candidate.
    pub warmup: usize,
    /// Timed runs per candidate (at least one run is always timed).
    pub reps: usize,
    /// Upper bound on live accelerator bytes, `None` for unlimited.
    pub memory_limit: Option<usize>,
    /// Seed of the counter-based dropout generator, `None` draws one at startup.
    pub seed: Option<u64>,
}

impl Default for GemsConfig {
    fn default() -> Self {
        Self {
            block_sizes: DEFAULT_BLOCK_SIZES.to_vec(),
            lanes: DEFAULT_LANES.to_vec(),
            rows_per_unit: DEFAULT_ROWS_PER_UNIT.to_vec(),
            matmul_tile_rows: DEFAULT_MATMUL_TILE_ROWS.to_vec(),
            autotune: true,
            warmup: DEFAULT_WARMUP,
            reps: DEFAULT_REPS,
            memory_limit: None,
            seed: None,
        }
    }
}

impl GemsConfig {
    /// Defaults overridden by `GEMS_*` environment variables.
    ///
    /// Recognised: `GEMS_BLOCK_SIZES`, `GEMS_LANES` (comma lists),
    /// `GEMS_AUTOTUNE` (bool), `GEMS_AUTOTUNE_WARMUP`, `GEMS_AUTOTUNE_REPS`,
    /// `GEMS_MEMORY_LIMIT` (bytes) and `GEMS_SEED`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(list) = lookup("GEMS_BLOCK_SIZES").and_then(|v| parse_list("GEMS_BLOCK_SIZES", &v)) {
            config.block_sizes = list;
        }
        if let Some(list) = lookup("GEMS_LANES").and_then(|v| parse_list("GEMS_LANES", &v)) {
            config.lanes = list;
        }
        if let Some(flag) = lookup("GEMS_AUTOTUNE").and_then(|v| parse_bool("GEMS_AUTOTUNE", &v)) {
            config.autotune = flag;
        }
        if let Some(n) = lookup("GEMS_AUTOTUNE_WARMUP").and_then(|v| parse_num("GEMS_AUTOTUNE_WARMUP", &v)) {
            config.warmup = n;
        }
        if let Some(n) = lookup("GEMS_AUTOTUNE_REPS").and_then(|v| parse_num("GEMS_AUTOTUNE_REPS", &v)) {
            config.reps = n;
        }
        if let Some(n) = lookup("GEMS_MEMORY_LIMIT").and_then(|v| parse_num("GEMS_MEMORY_LIMIT", &v)) {
            config.memory_limit = Some(n);
        }
        if let Some(n) = lookup("GEMS_SEED").and_then(|v| parse_num::<u64>("GEMS_SEED", &v)) {
            config.seed = Some(n);
        }
        config
    }

    /// Config that caches the first candidate without measuring.
    ///
    /// Handy in tests where timing noise is irrelevant.
    pub fn untuned() -> Self {
        Self {
            autotune: false,
            ..Self::default()
        }
    }
}

fn parse_num<T: std::str::FromStr>(var: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {var}={raw:?}: not a number");
            None
        }
    }
}

fn parse_list(var: &str, raw: &str) -> Option<Vec<usize>> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>() {
            Ok(v) if v > 0 => out.push(v),
            _ => {
                log::warn!("ignoring {var}={raw:?}: `{part}` is not a positive integer");
                return None;
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn parse_bool(var: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("ignoring {var}={raw:?}: not a boolean");
            None
        }
    }
}
