//! Accelerator memory accounting.
//!
//! Every destination buffer an operator produces is allocated through a
//! [`MemoryLedger`]. The ledger counts allocations, tracks live bytes and
//! refuses allocations that would exceed the configured limit, so memory
//! pressure surfaces as [`GemsError::OutOfMemory`] instead of an abort.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::dtype::Element;
use crate::error::{GemsError, Result};

/// Allocation bookkeeping for one accelerator device.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    limit: Option<usize>,
    live_bytes: AtomicUsize,
    allocations: AtomicUsize,
}

impl MemoryLedger {
    /// Create a ledger with an optional limit on live bytes.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            live_bytes: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
        }
    }

    /// Number of successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }

    /// Bytes currently held by live buffers.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    /// Configured limit on live bytes.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn reserve(self: &Arc<Self>, bytes: usize) -> Result<Reservation> {
        let mut current = self.live_bytes.load(Ordering::Acquire);
        loop {
            let next = current
                .checked_add(bytes)
                .ok_or_else(|| GemsError::OutOfMemory(format!("{bytes} bytes overflows the ledger")))?;
            if let Some(limit) = self.limit {
                if next > limit {
                    return Err(GemsError::OutOfMemory(format!(
                        "requested {bytes} bytes with {current} live, limit is {limit}"
                    )));
                }
            }
            match self
                .live_bytes
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        Ok(Reservation {
            ledger: Arc::clone(self),
            bytes,
        })
    }
}

/// Bytes held against a ledger; released on drop.
#[derive(Debug)]
pub(crate) struct Reservation {
    ledger: Arc<MemoryLedger>,
    bytes: usize,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.live_bytes.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// Element storage of a tensor, optionally charged to a ledger.
#[derive(Debug)]
pub(crate) struct Storage<T> {
    data: Vec<T>,
    // dropped after `data`; released bytes never outlive the buffer
    _reservation: Option<Reservation>,
}

impl<T: Element> Storage<T> {
    pub(crate) fn host(data: Vec<T>) -> Self {
        Self {
            data,
            _reservation: None,
        }
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }
}

/// Allocate `len` default-initialised elements charged to `ledger`.
pub(crate) fn allocate<T: Element>(ledger: &Arc<MemoryLedger>, len: usize) -> Result<Storage<T>> {
    let bytes = len
        .checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| GemsError::OutOfMemory(format!("{len} elements overflow usize bytes")))?;
    let reservation = ledger.reserve(bytes)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| GemsError::OutOfMemory(format!("{bytes} bytes: {e}")))?;
    data.resize(len, T::default());
    ledger.allocations.fetch_add(1, Ordering::AcqRel);
    Ok(Storage {
        data,
        _reservation: Some(reservation),
    })
}

/// Allocate a copy of `src` charged to `ledger`.
pub(crate) fn allocate_from<T: Element>(ledger: &Arc<MemoryLedger>, src: &[T]) -> Result<Storage<T>> {
    let mut storage = allocate::<T>(ledger, src.len())?;
    storage.as_mut_slice().copy_from_slice(src);
    Ok(storage)
}
