//! Kernel bodies executed by the lane-pool accelerator.
//!
//! A body computes one execution unit: it receives its program id and its
//! exclusive block of the destination, and reads the sources it needs.
//! Host-side launchers in [`crate::ops`] validate, allocate and launch them.

pub mod dropout;
pub mod elementwise;
pub mod matmul;
pub mod normalization;
pub mod reduction;
pub mod resize;
