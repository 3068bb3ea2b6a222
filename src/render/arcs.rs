//! Relation arc rendering
//!
//! Materializes a planned `LinkPlan` into an SVG layer over the text and
//! resizes the reserved spacer region above it. Drawing strictly follows
//! overlay placement within a render pass, since paths anchor to the
//! overlays' finalized geometry. Every drawn element is
//! pointer-transparent.

use super::paths::LinkPlan;
use crate::error::EngineError;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

const ARC_STROKE: &str = "#4a5568";
const ARC_STROKE_WIDTH: &str = "1.5";
const MARKER_RADIUS: f32 = 3.5;
const LABEL_FONT_SIZE: f32 = 11.0;
/// Approximate glyph width used to size label background patches
const LABEL_CHAR_WIDTH: f32 = 6.5;
const LABEL_PATCH_PADDING: f32 = 3.0;

/// Draws connective paths for links into a dedicated SVG layer
pub struct RelationArcRenderer {
    document: Document,
    container: Element,
    spacer: Element,
    svg_layer: Option<Element>,
}

impl RelationArcRenderer {
    /// The spacer element is the reserved region above the text whose
    /// height this renderer owns.
    pub fn attach(
        document: Document,
        container: Element,
        spacer_id: &str,
    ) -> Result<Self, EngineError> {
        let spacer = document
            .get_element_by_id(spacer_id)
            .ok_or_else(|| EngineError::MissingContainer(spacer_id.to_string()))?;
        Ok(Self {
            document,
            container,
            spacer,
            svg_layer: None,
        })
    }

    /// Replace the drawn arcs with a new plan
    ///
    /// The spacer is resized first; paths rise into it with negative y
    /// coordinates relative to the container.
    pub fn draw(&mut self, plan: &LinkPlan) -> Result<(), EngineError> {
        self.resize_spacer(plan.spacer_height);
        self.clear();

        if plan.paths.is_empty() {
            return Ok(());
        }

        let svg = self.create_svg_layer()?;
        for planned in &plan.paths {
            let path = self.svg_element("path")?;
            let _ = path.set_attribute("d", &planned.d);
            let _ = path.set_attribute("fill", "none");
            let _ = path.set_attribute("stroke", ARC_STROKE);
            let _ = path.set_attribute("stroke-width", ARC_STROKE_WIDTH);
            let _ = path.set_attribute("data-link-id", &planned.link_id);
            let _ = svg.append_child(&path);

            if let Some(arrow_d) = &planned.arrow {
                let arrow = self.svg_element("path")?;
                let _ = arrow.set_attribute("d", arrow_d);
                let _ = arrow.set_attribute("fill", ARC_STROKE);
                let _ = svg.append_child(&arrow);
            }

            if let Some((cx, cy)) = planned.marker {
                let marker = self.svg_element("circle")?;
                let _ = marker.set_attribute("cx", &cx.to_string());
                let _ = marker.set_attribute("cy", &cy.to_string());
                let _ = marker.set_attribute("r", &MARKER_RADIUS.to_string());
                let _ = marker.set_attribute("fill", ARC_STROKE);
                let _ = svg.append_child(&marker);
            }

            if let Some(label) = &planned.label {
                self.draw_label(&svg, &label.text, label.x, label.y)?;
            }
        }

        self.svg_layer = Some(svg);
        Ok(())
    }

    /// Drop the SVG layer and collapse the spacer
    pub fn clear_all(&mut self) {
        self.clear();
        self.resize_spacer(0.0);
    }

    fn clear(&mut self) {
        if let Some(svg) = self.svg_layer.take() {
            svg.remove();
        }
    }

    fn resize_spacer(&self, height: f32) {
        if let Some(el) = self.spacer.dyn_ref::<HtmlElement>() {
            let _ = el.style().set_property("height", &format!("{}px", height));
        }
    }

    fn create_svg_layer(&self) -> Result<Element, EngineError> {
        let svg = self.svg_element("svg")?;
        svg.set_attribute("class", "relation-arc-layer").ok();
        // Absolutely positioned over the container; overflow stays
        // visible so paths can rise into the spacer above.
        let _ = svg.set_attribute(
            "style",
            "position: absolute; left: 0; top: 0; width: 100%; height: 100%; \
             overflow: visible; pointer-events: none;",
        );
        self.container
            .append_child(&svg)
            .map_err(|_| EngineError::MissingContainer("arc container".to_string()))?;
        Ok(svg)
    }

    fn svg_element(&self, name: &str) -> Result<Element, EngineError> {
        self.document
            .create_element_ns(Some(SVG_NS), name)
            .map_err(|_| EngineError::MissingContainer(format!("svg {}", name)))
    }

    /// Link-type text at the path apex with a background patch for
    /// legibility
    fn draw_label(&self, svg: &Element, text: &str, x: f32, y: f32) -> Result<(), EngineError> {
        let width = text.chars().count() as f32 * LABEL_CHAR_WIDTH + 2.0 * LABEL_PATCH_PADDING;
        let height = LABEL_FONT_SIZE + 2.0 * LABEL_PATCH_PADDING;

        let patch = self.svg_element("rect")?;
        let _ = patch.set_attribute("x", &(x - width / 2.0).to_string());
        let _ = patch.set_attribute("y", &(y - height / 2.0).to_string());
        let _ = patch.set_attribute("width", &width.to_string());
        let _ = patch.set_attribute("height", &height.to_string());
        let _ = patch.set_attribute("fill", "white");
        let _ = patch.set_attribute("opacity", "0.85");
        let _ = patch.set_attribute("rx", "2");
        let _ = svg.append_child(&patch);

        let label = self.svg_element("text")?;
        let _ = label.set_attribute("x", &x.to_string());
        let _ = label.set_attribute("y", &(y + LABEL_FONT_SIZE / 3.0).to_string());
        let _ = label.set_attribute("text-anchor", "middle");
        let _ = label.set_attribute("font-size", &LABEL_FONT_SIZE.to_string());
        let _ = label.set_attribute("fill", ARC_STROKE);
        label.set_text_content(Some(text));
        let _ = svg.append_child(&label);
        Ok(())
    }
}
