//! Transfers between host tensors and device buffers.

use cubecl::prelude::*;

use crate::dtype::Element;
use crate::error::{GemsError, Result};
use crate::tensor::Tensor;

use super::runtime::{GpuBuffer, RuntimeContext};

/// Copy `data` into a new device buffer of the given shape.
///
/// # Errors
///
/// Returns [`GemsError::InvalidBufferSize`] when `data.len()` is not the
/// product of `shape`.
pub fn to_device<R: Runtime, T: CubePrimitive + bytemuck::Pod>(
    data: &[T],
    shape: Vec<usize>,
    runtime: &RuntimeContext<R>,
) -> Result<GpuBuffer<R>> {
    let expected: usize = shape.iter().product();
    if data.len() != expected {
        return Err(GemsError::InvalidBufferSize {
            expected,
            actual: data.len(),
        });
    }
    let handle = runtime.client().create(bytemuck::cast_slice(data));
    Ok(GpuBuffer::from_handle(handle, shape))
}

/// Read a device buffer back to the host.
///
/// Blocks until every kernel writing the buffer has completed.
pub fn to_cpu<R: Runtime, T: CubePrimitive + bytemuck::Pod>(
    buffer: &GpuBuffer<R>,
    runtime: &RuntimeContext<R>,
) -> Result<Vec<T>> {
    let bytes = runtime.client().read_one(buffer.handle().clone().binding());
    let data: &[T] = bytemuck::try_cast_slice(&bytes)
        .map_err(|e| GemsError::CubeCLError(format!("device read returned misaligned bytes: {e}")))?;
    if data.len() < buffer.len() {
        return Err(GemsError::InvalidBufferSize {
            expected: buffer.len(),
            actual: data.len(),
        });
    }
    Ok(data[..buffer.len()].to_vec())
}

/// Allocate an uninitialised device buffer.
pub fn allocate<R: Runtime, T: CubePrimitive>(
    shape: Vec<usize>,
    runtime: &RuntimeContext<R>,
) -> Result<GpuBuffer<R>> {
    let len: usize = shape.iter().product();
    let bytes = len
        .checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| GemsError::OutOfMemory(format!("{len} elements of {shape:?}")))?;
    let handle = runtime.client().empty(bytes);
    Ok(GpuBuffer::from_handle(handle, shape))
}

/// Copy a tensor to the device, keeping its shape.
pub fn tensor_to_device<R, T>(tensor: &Tensor<T>, runtime: &RuntimeContext<R>) -> Result<GpuBuffer<R>>
where
    R: Runtime,
    T: Element + CubePrimitive + bytemuck::Pod,
{
    to_device(tensor.as_slice(), tensor.shape().to_vec(), runtime)
}

/// Read a device buffer into a host tensor of the buffer's shape.
pub fn tensor_from_device<R, T>(buffer: &GpuBuffer<R>, runtime: &RuntimeContext<R>) -> Result<Tensor<T>>
where
    R: Runtime,
    T: Element + CubePrimitive + bytemuck::Pod,
{
    let data = to_cpu(buffer, runtime)?;
    Tensor::from_vec(buffer.shape().to_vec(), data)
}

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    #[cfg(feature = "cuda")]
    fn test_memory_transfer_roundtrip() {
        use crate::cube::runtime::init_cuda_runtime;

        let Ok(runtime) = init_cuda_runtime() else {
            return;
        };
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let gpu_buffer = to_device(&data, vec![2, 3], &runtime).unwrap();
        let result: Vec<f32> = to_cpu(&gpu_buffer, &runtime).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    #[cfg(feature = "wgpu")]
    fn test_tensor_roundtrip_wgpu() {
        use crate::cube::runtime::init_wgpu_runtime;

        let Ok(runtime) = init_wgpu_runtime() else {
            return;
        };
        let tensor = Tensor::from_vec([2, 2], vec![10.0f32, 20.0, 30.0, 40.0]).unwrap();
        let gpu_buf = tensor_to_device(&tensor, &runtime).unwrap();
        let result: Tensor<f32> = tensor_from_device(&gpu_buf, &runtime).unwrap();
        assert_eq!(result.shape(), &[2, 2]);
        assert_eq!(result.to_vec(), tensor.to_vec());
    }

    #[test]
    #[cfg(feature = "wgpu")]
    fn test_shape_mismatch_rejected() {
        use crate::cube::runtime::init_wgpu_runtime;

        let Ok(runtime) = init_wgpu_runtime() else {
            return;
        };
        let err = to_device(&[1.0f32, 2.0, 3.0], vec![2, 2], &runtime).err().unwrap();
        assert!(err.is_contract_violation());
    }
}
