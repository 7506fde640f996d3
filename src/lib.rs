//! Backend-agnostic GPU abstraction over Vulkan and WebGPU.
//!
//! Start from an [`Instance`], pick an [`Adapter`], create a [`Device`] and
//! drive it through its [`Queue`]. Every object the device creates is named by
//! a generation-checked [`Handle`].

pub mod utils;
pub mod gpu;

pub use gpu::*;
pub use utils::{Handle, Pool, TIMEOUT_INFINITE};
