//! Tensor descriptor: shared contiguous storage, shape and device.

use std::sync::Arc;

use crate::allocator::Storage;
use crate::device::Device;
use crate::dtype::{DType, Element};
use crate::error::{GemsError, Result};

/// A contiguous, row-major, immutable tensor.
///
/// Cloning is cheap: the storage is shared. Operators never mutate their
/// inputs; every output is a freshly allocated tensor on the accelerator.
#[derive(Debug, Clone)]
pub struct Tensor<T: Element> {
    storage: Arc<Storage<T>>,
    shape: Vec<usize>,
    device: Device,
}

impl<T: Element> Tensor<T> {
    /// Build a host tensor from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`GemsError::InvalidBufferSize`] when `data.len()` is not the
    /// product of `shape`.
    pub fn from_vec(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GemsError::InvalidBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            storage: Arc::new(Storage::host(data)),
            shape,
            device: Device::Host,
        })
    }

    /// A 0-dimensional host tensor.
    pub fn scalar(value: T) -> Self {
        Self {
            storage: Arc::new(Storage::host(vec![value])),
            shape: Vec::new(),
            device: Device::Host,
        }
    }

    pub(crate) fn from_storage(storage: Storage<T>, shape: Vec<usize>, device: Device) -> Self {
        debug_assert_eq!(storage.len(), shape.iter().product::<usize>());
        Self {
            storage: Arc::new(storage),
            shape,
            device,
        }
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.storage.len()
    }

    /// Check if the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Device holding the storage.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Element type tag.
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Row-major view of the elements.
    pub fn as_slice(&self) -> &[T] {
        self.storage.as_slice()
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Copy of this tensor in plain host memory.
    pub fn to_host(&self) -> Tensor<T> {
        Self {
            storage: Arc::new(Storage::host(self.to_vec())),
            shape: self.shape.clone(),
            device: Device::Host,
        }
    }

    /// Same storage viewed with a different shape of equal element count.
    pub fn reshape(&self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(GemsError::InvalidShape {
                expected: self.shape.clone(),
                actual: shape,
            });
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            shape,
            device: self.device,
        })
    }

    /// Element at a multi-dimensional index, `None` when out of range.
    pub fn get(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &extent) in index.iter().zip(&self.shape) {
            if i >= extent {
                return None;
            }
            offset = offset * extent + i;
        }
        self.as_slice().get(offset).copied()
    }

    /// Mutable access to the storage when no other tensor shares it.
    pub(crate) fn storage_mut(&mut self) -> Option<&mut [T]> {
        Arc::get_mut(&mut self.storage).map(Storage::as_mut_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_len() {
        let t = Tensor::from_vec([2, 3], vec![0.0f32; 6]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.device(), Device::Host);
        assert_eq!(t.dtype(), DType::F32);

        let err = Tensor::from_vec([2, 2], vec![1.0f32; 3]).unwrap_err();
        assert!(matches!(err, GemsError::InvalidBufferSize { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_get_and_reshape() {
        let t = Tensor::from_vec([2, 3], (0..6).collect::<Vec<i32>>()).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(5));
        assert_eq!(t.get(&[2, 0]), None);
        let r = t.reshape([3, 2]).unwrap();
        assert_eq!(r.get(&[2, 1]), Some(5));
        assert!(t.reshape([4]).is_err());
    }

    #[test]
    fn test_scalar() {
        let s = Tensor::scalar(3.5f64);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
        assert_eq!(s.get(&[]), Some(3.5));
    }
}
