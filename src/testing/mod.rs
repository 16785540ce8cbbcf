//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising the dispatcher
//! without a live messaging service.

pub mod mocks;

pub use mocks::*;
