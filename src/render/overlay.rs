//! Span overlay rendering
//!
//! Owns the create/delete/reload lifecycle of the overlay DOM elements
//! for the current instance. A render pass walks the state machine
//! `Clearing -> LayoutWait -> Placing -> Stable`; a pass superseded by a
//! newer one aborts silently before touching the DOM (`Aborted`).
//!
//! The renderer holds only transient references to DOM elements; the
//! span/link data of record lives in the annotation store.

use super::style::{self, StyleDirective};
use crate::error::EngineError;
use crate::geometry::{OffsetToGeometryMapper, SurfaceProbe};
use crate::models::{Geometry, Span, SpanKey};
use crate::overlap::OverlapRecord;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomEvent, CustomEventInit, Document, Element};

/// Base z-index for overlay bodies; depth is added per span
pub const OVERLAY_BASE_Z: i32 = 10;

/// Extra elevation for the interactive label/delete affordances
const AFFORDANCE_Z_BOOST: i32 = 50;

/// Event dispatched on the container after each span is placed
pub const SPAN_CREATED_EVENT: &str = "span-created";

/// Event dispatched when an overlay's delete affordance is clicked
pub const SPAN_DELETE_REQUESTED_EVENT: &str = "span-delete-requested";

/// Render pass states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    Clearing,
    LayoutWait,
    Placing,
    Stable,
    /// A newer pass started; this one stopped before mutating the DOM
    Aborted,
}

/// Monotonic render-pass token
///
/// `begin` mints the generation a pass runs under; a pass holding an
/// older value has been superseded and must stop before touching the
/// DOM. `invalidate` supersedes without starting a new pass.
#[derive(Clone, Default)]
pub struct PassToken {
    current: Rc<Cell<u64>>,
}

impl PassToken {
    pub fn begin(&self) -> u64 {
        let generation = self.current.get() + 1;
        self.current.set(generation);
        generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current.get() == generation
    }

    pub fn invalidate(&self) {
        self.current.set(self.current.get() + 1);
    }
}

/// Places and removes overlay elements for one instance
pub struct OverlayRenderer {
    document: Document,
    container: Element,
    text_layer: Element,
    overlay_layer: Element,
    token: PassToken,
    geometries: HashMap<String, Vec<Geometry>>,
    delete_closures: Vec<Closure<dyn FnMut(web_sys::Event)>>,
}

impl OverlayRenderer {
    /// Look up the required containers; absence of any of them is a hard
    /// precondition failure.
    pub fn attach(
        document: Document,
        container_id: &str,
        text_layer_id: &str,
        overlay_layer_id: &str,
    ) -> Result<Self, EngineError> {
        let container = require_element(&document, container_id)?;
        let text_layer = require_element(&document, text_layer_id)?;
        let overlay_layer = require_element(&document, overlay_layer_id)?;
        Ok(Self {
            document,
            container,
            text_layer,
            overlay_layer,
            token: PassToken::default(),
            geometries: HashMap::new(),
            delete_closures: Vec::new(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn container(&self) -> &Element {
        &self.container
    }

    /// Last-known geometries from the most recent completed pass, keyed
    /// by span id. The arc renderer reads these.
    pub fn geometries(&self) -> &HashMap<String, Vec<Geometry>> {
        &self.geometries
    }

    /// CLEARING: bump the generation token, drop every overlay node, and
    /// re-assert the canonical plain text into the text layer. Returns
    /// the pass's captured token.
    pub fn begin_pass(&mut self, text: &str) -> u64 {
        let generation = self.token.begin();
        self.clear_overlays();
        self.text_layer.set_text_content(Some(text));
        generation
    }

    /// Whether a captured token still names the newest pass
    pub fn is_current(&self, generation: u64) -> bool {
        self.token.is_current(generation)
    }

    /// Invalidate any in-flight pass and drop all overlay DOM, e.g. on
    /// navigation or instance wipe.
    pub fn invalidate(&mut self) {
        self.token.invalidate();
        self.clear_overlays();
    }

    /// The text layer's single contiguous text node, required by the
    /// offset contract
    pub fn text_node(&self) -> Result<web_sys::Node, EngineError> {
        self.text_layer
            .first_child()
            .ok_or_else(|| EngineError::MissingContainer("text layer text node".to_string()))
    }

    /// PLACING: create overlay elements for every span, ascending by
    /// start offset. A span whose geometry never resolves is omitted
    /// from the visual layer; the data is unaffected. Aborts without
    /// touching the DOM if the pass was superseded.
    pub fn place_spans<P: SurfaceProbe>(
        &mut self,
        generation: u64,
        spans: &[Span],
        records: &BTreeMap<SpanKey, OverlapRecord>,
        mapper: &OffsetToGeometryMapper<P>,
        color: Option<&str>,
    ) -> Result<PassState, EngineError> {
        if !self.is_current(generation) {
            log::debug!("render pass {} superseded, aborting", generation);
            return Ok(PassState::Aborted);
        }

        let mut ordered: Vec<&Span> = spans.iter().filter(|s| s.is_valid()).collect();
        ordered.sort_by_key(|s| s.start);

        for span in ordered {
            if !self.is_current(generation) {
                return Ok(PassState::Aborted);
            }
            let rects = match mapper.map_range(span.start, span.end) {
                Ok(rects) => rects,
                Err(EngineError::LayoutUnavailable { start, end }) => {
                    log::warn!(
                        "no geometry for span '{}' ({}..{}), omitting overlay",
                        span.label,
                        start,
                        end
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            let record = records.get(&span.key());
            let (depth, multiplier) = match record {
                Some(r) => (r.depth, r.height_multiplier),
                None => (1, 1.0),
            };

            let mut placed = Vec::with_capacity(rects.len());
            for (i, rect) in rects.iter().enumerate() {
                let adjusted = expanded_rect(rect, multiplier);
                let element = self.create_overlay(span, &adjusted, depth, i == 0, color)?;
                self.emit_span_created(span, &element);
                placed.push(adjusted);
            }
            self.geometries.insert(span.id.clone(), placed);
        }

        Ok(PassState::Stable)
    }

    fn clear_overlays(&mut self) {
        while let Some(child) = self.overlay_layer.first_child() {
            if let Some(el) = child.dyn_ref::<Element>() {
                el.remove();
            } else {
                let _ = self.overlay_layer.remove_child(&child);
            }
        }
        self.geometries.clear();
        self.delete_closures.clear();
    }

    /// One overlay element per rectangle; label/delete affordances only
    /// on the first fragment of a span.
    fn create_overlay(
        &mut self,
        span: &Span,
        rect: &Geometry,
        depth: u32,
        first_fragment: bool,
        color: Option<&str>,
    ) -> Result<Element, EngineError> {
        let overlay = self
            .document
            .create_element("div")
            .map_err(|_| EngineError::MissingContainer("overlay element".to_string()))?;
        overlay.set_class_name("span-overlay");
        let _ = overlay.set_attribute("data-span-id", &span.id);

        let fill = color
            .map(str::to_string)
            .unwrap_or_else(|| style::label_color(&span.label).to_string());
        style::apply_directive(&overlay, &overlay_directive(rect, depth, &fill));

        if first_fragment {
            self.attach_affordances(span, &overlay, depth)?;
        }

        self.overlay_layer
            .append_child(&overlay)
            .map_err(|_| EngineError::MissingContainer("overlay layer".to_string()))?;
        Ok(overlay)
    }

    fn attach_affordances(
        &mut self,
        span: &Span,
        overlay: &Element,
        depth: u32,
    ) -> Result<(), EngineError> {
        let label = self
            .document
            .create_element("span")
            .map_err(|_| EngineError::MissingContainer("overlay label".to_string()))?;
        label.set_class_name("span-overlay-label");
        label.set_text_content(Some(&span.label));
        style::apply_directive(&label, &affordance_directive(depth));
        let _ = overlay.append_child(&label);

        let delete = self
            .document
            .create_element("span")
            .map_err(|_| EngineError::MissingContainer("overlay delete".to_string()))?;
        delete.set_class_name("span-overlay-delete");
        delete.set_text_content(Some("\u{00d7}"));
        style::apply_directive(&delete, &affordance_directive(depth));

        // Delete clicks are surfaced as an event on the container so the
        // engine (or any external tool) can react without the renderer
        // depending on them.
        let container = self.container.clone();
        let span_id = span.id.clone();
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let detail = js_sys::Object::new();
            let _ = js_sys::Reflect::set(
                &detail,
                &JsValue::from_str("spanId"),
                &JsValue::from_str(&span_id),
            );
            dispatch(&container, SPAN_DELETE_REQUESTED_EVENT, detail.into());
        }) as Box<dyn FnMut(web_sys::Event)>);
        let _ = delete
            .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        self.delete_closures.push(closure);

        let _ = overlay.append_child(&delete);
        Ok(())
    }

    /// Synchronous "span created" notification carrying the span data
    /// and the created element
    fn emit_span_created(&self, span: &Span, element: &Element) {
        let detail = js_sys::Object::new();
        if let Ok(span_js) = serde_wasm_bindgen::to_value(span) {
            let _ = js_sys::Reflect::set(&detail, &JsValue::from_str("span"), &span_js);
        }
        let _ = js_sys::Reflect::set(&detail, &JsValue::from_str("element"), element);
        dispatch(&self.container, SPAN_CREATED_EVENT, detail.into());
    }
}

fn require_element(document: &Document, id: &str) -> Result<Element, EngineError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| EngineError::MissingContainer(id.to_string()))
}

fn dispatch(target: &Element, event_type: &str, detail: JsValue) {
    let mut init = CustomEventInit::new();
    init.detail(&detail);
    init.bubbles(true);
    if let Ok(event) = CustomEvent::new_with_event_init_dict(event_type, &init) {
        let _ = target.dispatch_event(&event);
    }
}

/// Grow a rectangle's height by the span's multiplier, centered on the
/// original vertical extent
pub fn expanded_rect(rect: &Geometry, multiplier: f32) -> Geometry {
    let height = rect.height * multiplier;
    Geometry::new(
        rect.x,
        rect.y - (height - rect.height) / 2.0,
        rect.width,
        height,
    )
}

/// Style for an overlay body: positioned rectangle, depth-layered, and
/// pointer-transparent so the text beneath stays selectable
pub fn overlay_directive(rect: &Geometry, depth: u32, color: &str) -> StyleDirective {
    StyleDirective::new(OVERLAY_BASE_Z + depth as i32)
        .set("position", "absolute")
        .set("left", format!("{}px", rect.x))
        .set("top", format!("{}px", rect.y))
        .set("width", format!("{}px", rect.width))
        .set("height", format!("{}px", rect.height))
        .set("background-color", color)
        .set("pointer-events", "none")
}

/// Style for label/delete affordances: elevated and interactive
fn affordance_directive(depth: u32) -> StyleDirective {
    StyleDirective::new(OVERLAY_BASE_Z + depth as i32 + AFFORDANCE_Z_BOOST)
        .set("pointer-events", "auto")
        .set("cursor", "pointer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_rect_is_centered() {
        let rect = Geometry::new(10.0, 100.0, 50.0, 20.0);
        let grown = expanded_rect(&rect, 2.0);
        assert_eq!(grown.height, 40.0);
        assert_eq!(grown.y, 90.0);
        // Vertical center unchanged
        assert_eq!(grown.y + grown.height / 2.0, rect.y + rect.height / 2.0);
        assert_eq!(grown.x, rect.x);
        assert_eq!(grown.width, rect.width);
    }

    #[test]
    fn test_base_multiplier_leaves_rect_unchanged() {
        let rect = Geometry::new(0.0, 10.0, 30.0, 18.0);
        assert_eq!(expanded_rect(&rect, 1.0), rect);
    }

    #[test]
    fn test_overlay_directive_layers_by_depth() {
        let rect = Geometry::new(5.0, 6.0, 70.0, 18.0);
        let shallow = overlay_directive(&rect, 1, "red");
        let deep = overlay_directive(&rect, 4, "red");
        assert_eq!(shallow.z_index, OVERLAY_BASE_Z + 1);
        assert_eq!(deep.z_index, OVERLAY_BASE_Z + 4);
        assert_eq!(shallow.get("pointer-events"), Some("none"));
        assert_eq!(shallow.get("left"), Some("5px"));
        assert_eq!(shallow.get("height"), Some("18px"));
    }

    #[test]
    fn test_affordances_are_elevated_and_interactive() {
        let directive = affordance_directive(2);
        assert!(directive.z_index > OVERLAY_BASE_Z + 2);
        assert_eq!(directive.get("pointer-events"), Some("auto"));
    }

    #[test]
    fn test_newer_pass_supersedes_older() {
        let token = PassToken::default();
        let first = token.begin();
        assert!(token.is_current(first));

        let second = token.begin();
        assert!(!token.is_current(first));
        assert!(token.is_current(second));
    }

    #[test]
    fn test_invalidate_supersedes_in_flight_pass() {
        let token = PassToken::default();
        let pass = token.begin();
        token.invalidate();
        assert!(!token.is_current(pass));
        // The next pass starts fresh and is current
        assert!(token.is_current(token.begin()));
    }
}
