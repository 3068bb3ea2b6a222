//! Data models for the span annotation overlay engine
//!
//! This module contains the persistent annotation types (spans, links)
//! and the derived rendering types shared across the engine.

pub mod core;

// Re-export commonly used types
pub use core::*;
