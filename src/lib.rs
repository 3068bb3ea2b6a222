//! Span Annotation Overlay Engine WASM Module
//!
//! Computes non-colliding visual layering for arbitrarily overlapping
//! span annotations, maps character offsets to pixel geometry on a live
//! text surface, and draws connective paths between linked spans, while
//! staying synchronized with the backend store of record.

pub mod api;
pub mod error;
pub mod geometry;
pub mod models;
pub mod overlap;
pub mod registry;
pub mod render;
pub mod store;

// Re-export commonly used types
pub use error::EngineError;
pub use models::core::*;

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    #[cfg(feature = "console_log")]
    console_log::init_with_level(log::Level::Debug).expect("failed to initialize logger");

    log::info!("span overlay engine WASM module initialized");
}
