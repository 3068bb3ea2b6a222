//! JavaScript-facing API
//!
//! This module provides the wasm-bindgen surface of the overlay engine.
//! `engine` exposes the per-schema `AnnotationEngine` class with its
//! load/create/delete operations; `helpers` carries shared serialization
//! and error-conversion utilities.

pub mod engine;
pub mod helpers;

pub use engine::AnnotationEngine;
