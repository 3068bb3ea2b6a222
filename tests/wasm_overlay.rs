//! Browser smoke tests for the overlay DOM edge
//!
//! Runs overlay placement against live layout: geometry comes from real
//! `Range` client rects, so these cover the DOM probe, the overlay
//! element lifecycle, and the superseded-pass rule end to end.

use span_overlay_wasm::geometry::{DomSurfaceProbe, OffsetToGeometryMapper, StabilizationPolicy};
use span_overlay_wasm::overlap::resolve_overlaps;
use span_overlay_wasm::render::overlay::{OverlayRenderer, PassState};
use span_overlay_wasm::Span;
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

wasm_bindgen_test_configure!(run_in_browser);

/// Build the container scaffolding the engine attaches to. Ids are
/// prefixed per test since all tests share the page.
fn mount(prefix: &str) -> Document {
    let document = web_sys::window().unwrap().document().unwrap();
    let body = document.body().unwrap();

    let container = document.create_element("div").unwrap();
    container.set_id(&format!("{}-container", prefix));
    container
        .set_attribute("style", "position: relative; width: 600px; font-size: 16px;")
        .unwrap();

    for layer in ["text", "overlay"] {
        let element = document.create_element("div").unwrap();
        element.set_id(&format!("{}-{}", prefix, layer));
        container.append_child(&element).unwrap();
    }
    body.append_child(&container).unwrap();
    document
}

fn attach(document: &Document, prefix: &str) -> OverlayRenderer {
    OverlayRenderer::attach(
        document.clone(),
        &format!("{}-container", prefix),
        &format!("{}-text", prefix),
        &format!("{}-overlay", prefix),
    )
    .unwrap()
}

fn mapper(document: &Document, renderer: &OverlayRenderer) -> OffsetToGeometryMapper<DomSurfaceProbe> {
    let probe = DomSurfaceProbe::new(
        document.clone(),
        renderer.text_node().unwrap(),
        renderer.container().clone(),
    );
    OffsetToGeometryMapper::new(probe, StabilizationPolicy::default())
}

fn overlay_span_ids(layer: &Element) -> Vec<String> {
    let mut ids = Vec::new();
    let mut child = layer.first_element_child();
    while let Some(element) = child {
        if let Some(id) = element.get_attribute("data-span-id") {
            ids.push(id);
        }
        child = element.next_element_sibling();
    }
    ids
}

#[wasm_bindgen_test]
fn test_nested_spans_each_get_an_overlay() {
    let document = mount("cat");
    let mut renderer = attach(&document, "cat");

    let spans = vec![
        Span::new("s1", "i1", "ner", "ANIMAL", 4, 7),
        Span::new("s2", "i1", "ner", "SENTENCE", 0, 22),
    ];
    let records = resolve_overlaps(&spans);

    let generation = renderer.begin_pass("The cat sat on the mat.");
    let mapper = mapper(&document, &renderer);
    let state = renderer
        .place_spans(generation, &spans, &records, &mapper, None)
        .unwrap();

    assert_eq!(state, PassState::Stable);
    let layer = document.get_element_by_id("cat-overlay").unwrap();
    let mut ids = overlay_span_ids(&layer);
    ids.sort();
    assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);
    assert_eq!(renderer.geometries().len(), 2);
}

#[wasm_bindgen_test]
fn test_superseded_pass_leaves_the_dom_untouched() {
    let document = mount("stale");
    let mut renderer = attach(&document, "stale");

    let spans = vec![Span::new("s1", "i1", "ner", "ANIMAL", 4, 7)];
    let records = resolve_overlaps(&spans);

    let generation = renderer.begin_pass("The cat sat on the mat.");
    let mapper = mapper(&document, &renderer);

    // A newer pass (here: an invalidation) supersedes the captured token
    renderer.invalidate();
    let state = renderer
        .place_spans(generation, &spans, &records, &mapper, None)
        .unwrap();

    assert_eq!(state, PassState::Aborted);
    let layer = document.get_element_by_id("stale-overlay").unwrap();
    assert_eq!(layer.child_element_count(), 0);
    assert!(renderer.geometries().is_empty());
}

#[wasm_bindgen_test]
fn test_begin_pass_reasserts_canonical_text() {
    let document = mount("text");
    let mut renderer = attach(&document, "text");

    renderer.begin_pass("The cat sat on the mat.");
    let layer = document.get_element_by_id("text-text").unwrap();
    assert_eq!(
        layer.text_content().as_deref(),
        Some("The cat sat on the mat.")
    );
}
