//! Overlay and relation rendering
//!
//! `overlay` owns the create/delete/reload lifecycle of span overlay
//! elements; `paths` plans connective paths for links as pure geometry;
//! `arcs` materializes those paths into an SVG layer; `style` carries the
//! declarative style directives both renderers emit.

pub mod arcs;
pub mod overlay;
pub mod paths;
pub mod style;

pub use overlay::{OverlayRenderer, PassState, PassToken};
pub use paths::{plan_links, LinkPlan};
pub use style::StyleDirective;
