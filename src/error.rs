//! Error types for the span overlay engine
//!
//! The taxonomy distinguishes conditions that are recovered locally
//! (layout never settled, an orphaned link endpoint, a superseded render
//! pass) from ones surfaced to the caller (network failure, invalid
//! selection, missing DOM containers). Nothing in the core panics; errors
//! cross the WASM boundary as `JsValue` only in the API layer.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Top-level engine error type
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Geometry query could not resolve within the retry budget.
    /// Recovered by omitting the span's visuals; data is unaffected.
    #[error("layout unavailable for range {start}..{end}")]
    LayoutUnavailable { start: usize, end: usize },

    /// A fetch rejected or returned a non-success status.
    /// Local state is left untouched; the protocol re-fetches on success.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// A link references a span id with no current geometry and the
    /// repair heuristic found no match.
    #[error("link {link_id} references missing span {span_id}")]
    OrphanedReference { link_id: String, span_id: String },

    /// Empty or zero-length selection, or missing label/schema context.
    /// Rejected before any network call.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A render pass whose generation token was superseded.
    /// Not a failure, a no-op abort.
    #[error("render pass superseded at generation {0}")]
    StalePass(u64),

    /// The authoritative current instance no longer matches the
    /// locally-cached id. Local state is wiped and the operation
    /// aborted before anything is submitted.
    #[error("instance changed upstream (had {cached}, server is on {current})")]
    InstanceMismatch { cached: String, current: String },

    /// A required DOM container (text layer, overlay layer, spacer) is
    /// absent. Hard precondition failure; the pass is aborted.
    #[error("missing container element: {0}")]
    MissingContainer(String),

    /// The engine was used after `dispose()`
    #[error("engine is disposed")]
    Disposed,
}

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}
