//! CubeCL client wrapper and device buffers.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use cubecl::prelude::*;
use cubecl::server::Handle;

use crate::error::{GemsError, Result};

// Re-export CubeCL's Runtime trait so downstream crates don't need cubecl directly
pub use cubecl::Runtime as CubeclRuntime;

/// Compute client of one CubeCL device.
pub struct RuntimeContext<R: Runtime> {
    client: ComputeClient<R::Server, R::Channel>,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> RuntimeContext<R> {
    /// Connect to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`GemsError::CubeCLError`] when the backend cannot open the
    /// device (no driver, no adapter).
    pub fn new(device: R::Device) -> Result<Self> {
        let client = panic::catch_unwind(AssertUnwindSafe(|| R::client(&device)))
            .map_err(|_| GemsError::CubeCLError(format!("cannot open a {} device", R::name())))?;
        Ok(Self {
            client,
            _phantom: PhantomData,
        })
    }

    /// Get a reference to the compute client.
    pub fn client(&self) -> &ComputeClient<R::Server, R::Channel> {
        &self.client
    }

    /// Get the backend name (e.g. "cuda", "wgpu<wgsl>").
    pub fn backend_name(&self) -> &'static str {
        R::name()
    }

    /// Memory page size and alignment of the device, in bytes.
    pub fn memory_properties(&self) -> (u64, u64) {
        let props = self.client.properties();
        let mem = props.memory_properties();
        (mem.max_page_size, mem.alignment)
    }

    /// Block until every enqueued kernel has completed.
    ///
    /// Launches return as soon as the kernel is queued, so autotune timings
    /// and host reads go through here.
    pub fn sync(&self) {
        // client.read() is a blocking sync point in CubeCL
        let handle = self.client.empty(1);
        let _ = self.client.read_one(handle.binding());
    }
}

/// Contiguous device buffer with a logical shape.
pub struct GpuBuffer<R: Runtime> {
    handle: Handle,
    shape: Vec<usize>,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> GpuBuffer<R> {
    /// Wrap a device handle holding `shape.iter().product()` elements.
    pub fn from_handle(handle: Handle, shape: Vec<usize>) -> Self {
        Self {
            handle,
            shape,
            _phantom: PhantomData,
        }
    }

    /// Logical shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Underlying CubeCL handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Connect to the first CUDA device.
///
/// # Errors
///
/// Returns an error if no CUDA device can be opened.
#[cfg(feature = "cuda")]
pub fn init_cuda_runtime() -> Result<RuntimeContext<cubecl_cuda::CudaRuntime>> {
    use cubecl_cuda::CudaDevice;

    RuntimeContext::new(CudaDevice::new(0))
}

/// Connect to the best available WGPU adapter.
///
/// # Errors
///
/// Returns an error if no adapter can be opened.
#[cfg(feature = "wgpu")]
pub fn init_wgpu_runtime() -> Result<RuntimeContext<cubecl_wgpu::WgpuRuntime>> {
    use cubecl_wgpu::WgpuDevice;

    RuntimeContext::new(WgpuDevice::BestAvailable)
}
