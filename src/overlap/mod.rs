//! Interval overlap resolution
//!
//! This module computes the overlap/containment graph over one instance's
//! spans and derives the visual layering (depth) and height multiplier
//! each span's overlay is rendered with.

pub mod resolver;

pub use resolver::{resolve_overlaps, OverlapRecord, BASE_MULTIPLIER, MAX_MULTIPLIER};
