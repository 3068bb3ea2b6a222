//! DOM-backed surface probe
//!
//! Queries live `Range` client rects against the text layer's single
//! contiguous text node and converts them to coordinates relative to the
//! reference container. Layout forcing is an `offset_height` read, which
//! makes the browser flush pending style/layout work synchronously.

use super::SurfaceProbe;
use crate::models::Geometry;
use wasm_bindgen::JsCast;
use web_sys::{Document, DomRect, Element, HtmlElement, Node, Range};

/// Probe over one instance's text node
pub struct DomSurfaceProbe {
    document: Document,
    text_node: Node,
    container: Element,
}

impl DomSurfaceProbe {
    /// The text node must be the container text layer's single child
    /// holding the instance's canonical plain text.
    pub fn new(document: Document, text_node: Node, container: Element) -> Self {
        Self {
            document,
            text_node,
            container,
        }
    }

    /// Build a DOM range over `[start, end)` of the text node
    fn make_range(&self, start: usize, end: usize) -> Option<Range> {
        let range = self.document.create_range().ok()?;
        range.set_start(&self.text_node, start as u32).ok()?;
        range.set_end(&self.text_node, end as u32).ok()?;
        Some(range)
    }

    /// Convert a viewport rect to container-relative coordinates
    fn relative(&self, rect: &DomRect, origin: &DomRect) -> Geometry {
        Geometry::new(
            (rect.x() - origin.x()) as f32,
            (rect.y() - origin.y()) as f32,
            rect.width() as f32,
            rect.height() as f32,
        )
    }
}

impl SurfaceProbe for DomSurfaceProbe {
    fn range_rects(&self, start: usize, end: usize) -> Vec<Geometry> {
        let range = match self.make_range(start, end) {
            Some(range) => range,
            None => return Vec::new(),
        };
        let origin = self.container.get_bounding_client_rect();
        // No rect list yet means the layout has not settled; the caller
        // retries under its stabilization policy.
        let rects = match range.get_client_rects() {
            Some(rects) => rects,
            None => return Vec::new(),
        };
        let mut out = Vec::with_capacity(rects.length() as usize);
        for i in 0..rects.length() {
            if let Some(rect) = rects.item(i) {
                out.push(self.relative(&rect, &origin));
            }
        }
        out
    }

    fn range_bounding_box(&self, start: usize, end: usize) -> Option<Geometry> {
        let range = self.make_range(start, end)?;
        let origin = self.container.get_bounding_client_rect();
        let rect = range.get_bounding_client_rect();
        Some(self.relative(&rect, &origin))
    }

    fn force_layout(&self) {
        // Reading offset_height flushes the layout queue
        if let Some(el) = self.container.dyn_ref::<HtmlElement>() {
            let _ = el.offset_height();
        }
    }
}
