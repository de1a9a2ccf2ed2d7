//! Error types for accelerated operators.

use thiserror::Error;

use crate::device::Device;

/// Result type for accelerated operators.
pub type Result<T> = std::result::Result<T, GemsError>;

/// Error types that can occur while validating, allocating or launching a kernel.
#[derive(Error, Debug)]
pub enum GemsError {
    /// The caller broke an operator's input contract (rank, size argument, scalar range).
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// An input tensor does not live on the device the operator executes on.
    #[error("Device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch {
        /// Device the operator executes on
        expected: Device,
        /// Device the offending tensor lives on
        actual: Device,
    },

    /// Tensor shape does not match what the operator requires.
    #[error("Invalid shape: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Invalid buffer size or dimensions.
    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size
        expected: usize,
        /// Actual buffer size
        actual: usize,
    },

    /// The destination buffer could not be allocated.
    #[error("Out of device memory: {0}")]
    OutOfMemory(String),

    /// Kernel launch failed.
    #[error("Kernel launch failed: {0}")]
    KernelLaunchFailed(String),

    /// Every autotune candidate failed to execute.
    #[error("Autotuning `{kernel}` failed: every candidate errored, last error: {source}")]
    AutotuneFailed {
        /// Kernel being tuned
        kernel: &'static str,
        /// Error reported by the last failing candidate
        #[source]
        source: Box<GemsError>,
    },

    /// Operator registration failed (duplicate or missing entry).
    #[error("Registration error: {0}")]
    Registration(String),

    /// Unsupported operation on this backend.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// CubeCL runtime error.
    #[cfg(feature = "gpu")]
    #[error("CubeCL error: {0}")]
    CubeCLError(String),
}

impl GemsError {
    /// Shorthand for a [`GemsError::ContractViolation`].
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Whether the error was raised by input validation rather than execution.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ContractViolation(_)
                | Self::DeviceMismatch { .. }
                | Self::InvalidShape { .. }
                | Self::InvalidBufferSize { .. }
        )
    }
}
