//! Device placement of tensors and the execution backends that own them.

use std::fmt;

/// Execution backend an accelerator device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Thread-pool executor; lanes are worker threads. Always available.
    Cpu,
    /// CUDA backend (NVIDIA GPUs), feature `cuda`.
    Cuda,
    /// WGPU backend (Vulkan/Metal/DirectX12), feature `wgpu`.
    Wgpu,
}

impl Backend {
    /// Get the name of the backend.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Cuda => "cuda",
            Backend::Wgpu => "wgpu",
        }
    }

    /// Check if the backend was compiled into this build.
    pub fn is_compiled(self) -> bool {
        match self {
            Backend::Cpu => true,
            Backend::Cuda => cfg!(feature = "cuda"),
            Backend::Wgpu => cfg!(feature = "wgpu"),
        }
    }
}

/// Location of a tensor's storage.
///
/// Tensors built from host data start on [`Device::Host`]; operators only accept
/// tensors that reside on the accelerator device of the executing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Plain host memory, not managed by any execution backend.
    Host,
    /// Memory owned by an accelerator backend.
    Accelerator {
        /// Backend owning the memory
        backend: Backend,
        /// Device ordinal within the backend
        ordinal: usize,
    },
}

impl Device {
    /// The thread-pool accelerator with the given ordinal.
    pub fn cpu(ordinal: usize) -> Self {
        Device::Accelerator {
            backend: Backend::Cpu,
            ordinal,
        }
    }

    /// Whether this device is an accelerator (as opposed to host memory).
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Device::Accelerator { .. })
    }

    /// Backend of the device, if it is an accelerator.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Device::Host => None,
            Device::Accelerator { backend, .. } => Some(*backend),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => write!(f, "host"),
            Device::Accelerator { backend, ordinal } => write!(f, "{}:{}", backend.name(), ordinal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Host.to_string(), "host");
        assert_eq!(Device::cpu(1).to_string(), "cpu:1");
    }

    #[test]
    fn test_device_is_accelerator() {
        assert!(Device::cpu(0).is_accelerator());
        assert!(!Device::Host.is_accelerator());
        assert_eq!(Device::cpu(0).backend(), Some(Backend::Cpu));
        assert!(Backend::Cpu.is_compiled());
    }
}
