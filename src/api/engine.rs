//! Per-schema annotation engine
//!
//! `AnnotationEngine` is the wasm-bindgen class the host page drives.
//! It wires the store, the overlay renderer, and the arc renderer
//! together and owns the render-pass orchestration: clearing strictly
//! precedes placement, placement strictly precedes arc drawing, and a
//! pass superseded by a newer generation token aborts without touching
//! the DOM. All mutations go through the backend and re-load on
//! acknowledgment, so the view converges to server truth.

use crate::api::helpers;
use crate::error::EngineError;
use crate::geometry::{DomSurfaceProbe, OffsetToGeometryMapper, StabilizationPolicy};
use crate::models::SchemaConfig;
use crate::overlap::resolve_overlaps;
use crate::registry::EngineRegistry;
use crate::render::arcs::RelationArcRenderer;
use crate::render::overlay::{OverlayRenderer, PassState};
use crate::render::paths::plan_links;
use crate::store::{protocol, HttpClient, SpanAnnotationStore};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

struct EngineInner {
    store: SpanAnnotationStore,
    overlay: OverlayRenderer,
    arcs: RelationArcRenderer,
    registry: EngineRegistry,
    config: SchemaConfig,
    policy: StabilizationPolicy,
    /// Canonical plain text of the loaded instance
    text: String,
}

/// Span overlay engine for one annotation schema
#[wasm_bindgen]
pub struct AnnotationEngine {
    inner: Rc<RefCell<EngineInner>>,
    client: HttpClient,
}

#[wasm_bindgen]
impl AnnotationEngine {
    /// Attach to the page's containers. `config` is a `SchemaConfig`
    /// object; `base_url` may be omitted for same-origin requests.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        container_id: String,
        text_layer_id: String,
        overlay_layer_id: String,
        spacer_id: String,
        base_url: Option<String>,
    ) -> Result<AnnotationEngine, JsValue> {
        let config: SchemaConfig = helpers::deserialize(config, "invalid schema config")?;

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| EngineError::MissingContainer("document".to_string()))?;

        let overlay = OverlayRenderer::attach(
            document.clone(),
            &container_id,
            &text_layer_id,
            &overlay_layer_id,
        )?;
        let arcs =
            RelationArcRenderer::attach(document, overlay.container().clone(), &spacer_id)?;

        let mut registry = EngineRegistry::new();
        registry.register(&config.schema)?;

        log::info!("annotation engine attached for schema '{}'", config.schema);

        Ok(AnnotationEngine {
            inner: Rc::new(RefCell::new(EngineInner {
                store: SpanAnnotationStore::new(config.schema.clone()),
                overlay,
                arcs,
                registry,
                config,
                policy: StabilizationPolicy::default(),
                text: String::new(),
            })),
            client: HttpClient::new(base_url.unwrap_or_default()),
        })
    }

    /// Load an instance: verify the instance-id guard, replace the local
    /// span/link set from the backend, and render.
    #[wasm_bindgen(js_name = loadInstance)]
    pub fn load_instance(&self, instance_id: String, text: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        let client = self.client.clone();
        future_to_promise(async move {
            load_instance(inner, client, instance_id, text).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Create a span from the current selection and label choice.
    /// Invalid selections are rejected before any network call.
    #[wasm_bindgen(js_name = createSpan)]
    pub fn create_span(&self, start: usize, end: usize, label: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        let client = self.client.clone();
        future_to_promise(async move {
            ensure_usable(&inner)?;
            verify_instance_guard(&inner, &client).await?;
            let body = {
                let inner = inner.borrow();
                let request = inner.store.span_create_request(start, end, &label)?;
                serialize_body(&request)?
            };
            submit_update(&client, &body).await?;
            reload_and_render(inner, client).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Delete a span by id; the tuple is marked with the "no value"
    /// sentinel in a full-state submission.
    #[wasm_bindgen(js_name = deleteSpan)]
    pub fn delete_span(&self, span_id: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        let client = self.client.clone();
        future_to_promise(async move {
            ensure_usable(&inner)?;
            verify_instance_guard(&inner, &client).await?;
            let body = {
                let inner = inner.borrow();
                let request = inner.store.span_delete_request(&span_id)?;
                serialize_body(&request)?
            };
            submit_update(&client, &body).await?;
            reload_and_render(inner, client).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Create a link between two or more spans (`span_ids` is an array
    /// of span id strings).
    #[wasm_bindgen(js_name = createLink)]
    pub fn create_link(
        &self,
        span_ids: JsValue,
        link_type: String,
        directed: bool,
    ) -> js_sys::Promise {
        let inner = self.inner.clone();
        let client = self.client.clone();
        future_to_promise(async move {
            ensure_usable(&inner)?;
            verify_instance_guard(&inner, &client).await?;
            let span_ids: Vec<String> = helpers::deserialize(span_ids, "invalid span id list")?;
            let body = {
                let inner = inner.borrow();
                let link = crate::models::Link {
                    id: String::new(),
                    schema: inner.store.schema().to_string(),
                    link_type,
                    span_ids,
                    direction: if directed {
                        crate::models::LinkDirection::Directed
                    } else {
                        crate::models::LinkDirection::Undirected
                    },
                    properties: Default::default(),
                };
                let request = inner.store.link_upsert_request(link)?;
                serialize_body(&request)?
            };
            submit_update(&client, &body).await?;
            reload_and_render(inner, client).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Remove one link by id
    #[wasm_bindgen(js_name = deleteLink)]
    pub fn delete_link(&self, link_id: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        let client = self.client.clone();
        future_to_promise(async move {
            ensure_usable(&inner)?;
            verify_instance_guard(&inner, &client).await?;
            let instance_id = current_instance_id(&inner)?;
            let (status, body) = client
                .delete(&protocol::link_delete_url(&instance_id, &link_id))
                .await?;
            ensure_success(status, &body)?;
            reload_and_render(inner, client).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Re-render against the current layout. Data is not refetched.
    /// The engine does not watch the viewport itself; the host is
    /// expected to call this from its `resize` listener (debounced as
    /// it sees fit) and after anything else that reflows the text.
    pub fn refresh(&self) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            ensure_usable(&inner)?;
            render_pass(inner).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Invalidate any in-flight pass and drop all engine-owned DOM.
    /// Further operations are rejected.
    pub fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        let schema = inner.store.schema().to_string();
        inner.registry.dispose(&schema);
        inner.overlay.invalidate();
        inner.arcs.clear_all();
        inner.store.wipe();
        log::info!("annotation engine for schema '{}' disposed", schema);
    }

    /// Current spans as a JavaScript array
    pub fn spans(&self) -> Result<JsValue, JsValue> {
        helpers::serialize(&self.inner.borrow().store.spans(), "span serialization")
    }

    /// Current links as a JavaScript array
    pub fn links(&self) -> Result<JsValue, JsValue> {
        helpers::serialize(&self.inner.borrow().store.links(), "link serialization")
    }
}

// ============================================================================
// Orchestration
// ============================================================================

async fn load_instance(
    inner: Rc<RefCell<EngineInner>>,
    client: HttpClient,
    instance_id: String,
    text: String,
) -> Result<(), EngineError> {
    ensure_usable(&inner)?;

    // Instance-id guard: never trust a locally-cached id across
    // navigation without re-verifying it.
    let (status, body) = client.get(protocol::CURRENT_INSTANCE_URL).await?;
    let authoritative = protocol::parse_current_instance(status, &body)?;
    {
        let mut inner = inner.borrow_mut();
        if inner.store.note_current_instance(&authoritative) {
            inner.overlay.invalidate();
            inner.arcs.clear_all();
        }
    }

    let (spans, links) = fetch_annotations(&client, &instance_id).await?;
    {
        let mut inner = inner.borrow_mut();
        inner.text = text;
        inner.store.apply_load(&instance_id, spans, links);
        let schema = inner.store.schema().to_string();
        inner.registry.activate(&schema)?;
    }

    render_pass(inner).await?;
    Ok(())
}

async fn fetch_annotations(
    client: &HttpClient,
    instance_id: &str,
) -> Result<(Vec<crate::models::Span>, Vec<crate::models::Link>), EngineError> {
    let (status, body) = client.get(&protocol::spans_url(instance_id)).await?;
    let spans = protocol::parse_spans(status, &body)?;
    let (status, body) = client.get(&protocol::links_url(instance_id)).await?;
    let links = protocol::parse_links(status, &body)?;
    Ok((spans, links))
}

/// Re-verify the instance-id guard against the authoritative current
/// instance. On mismatch the store is wiped, engine-owned DOM dropped,
/// and the caller's operation aborts.
async fn verify_instance_guard(
    inner: &Rc<RefCell<EngineInner>>,
    client: &HttpClient,
) -> Result<(), EngineError> {
    let (status, body) = client.get(protocol::CURRENT_INSTANCE_URL).await?;
    let authoritative = protocol::parse_current_instance(status, &body)?;
    let mut inner = inner.borrow_mut();
    if let Err(err) = inner.store.ensure_instance(&authoritative) {
        inner.overlay.invalidate();
        inner.arcs.clear_all();
        return Err(err);
    }
    Ok(())
}

async fn reload_and_render(
    inner: Rc<RefCell<EngineInner>>,
    client: HttpClient,
) -> Result<(), EngineError> {
    verify_instance_guard(&inner, &client).await?;
    let instance_id = current_instance_id(&inner)?;
    let (spans, links) = fetch_annotations(&client, &instance_id).await?;
    inner
        .borrow_mut()
        .store
        .apply_load(&instance_id, spans, links);
    render_pass(inner).await?;
    Ok(())
}

/// One full render pass: CLEARING -> LAYOUT_WAIT -> PLACING (spans,
/// then arcs) -> STABLE, or ABORTED if a newer pass supersedes it.
async fn render_pass(inner: Rc<RefCell<EngineInner>>) -> Result<PassState, EngineError> {
    // CLEARING
    let generation = {
        let mut inner = inner.borrow_mut();
        let text = inner.text.clone();
        inner.overlay.begin_pass(&text)
    };

    // LAYOUT_WAIT: give the rendering target one tick to settle the
    // freshly swapped text before geometry queries start.
    next_tick().await;

    let mut guard = inner.borrow_mut();
    let inner = &mut *guard;
    if !inner.overlay.is_current(generation) {
        log::debug!("render pass {} superseded during layout wait", generation);
        return Ok(PassState::Aborted);
    }

    let spans = inner.store.spans().to_vec();
    let links = inner.store.links().to_vec();

    if spans.is_empty() {
        // Nothing to place; still reconcile the arc layer and spacer
        let plan = plan_links(&links, inner.overlay.geometries(), &spans, false);
        inner.arcs.draw(&plan)?;
        return Ok(PassState::Stable);
    }

    // PLACING
    let text_node = inner.overlay.text_node()?;
    let probe = DomSurfaceProbe::new(
        inner.overlay.document().clone(),
        text_node,
        inner.overlay.container().clone(),
    );
    let mapper = OffsetToGeometryMapper::new(probe, inner.policy);
    let records = resolve_overlaps(&spans);
    let state = inner.overlay.place_spans(
        generation,
        &spans,
        &records,
        &mapper,
        inner.config.color.as_deref(),
    )?;
    if state == PassState::Aborted {
        return Ok(state);
    }

    // Arc drawing strictly follows placement; it reads the finalized
    // overlay geometries.
    let plan = plan_links(
        &links,
        inner.overlay.geometries(),
        &spans,
        inner.config.show_link_labels,
    );
    inner.arcs.draw(&plan)?;

    Ok(PassState::Stable)
}

/// Await one microtask so a forced layout can take effect on engines
/// that need the extra tick
async fn next_tick() {
    let promise = js_sys::Promise::resolve(&JsValue::UNDEFINED);
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

fn ensure_usable(inner: &Rc<RefCell<EngineInner>>) -> Result<(), EngineError> {
    let inner = inner.borrow();
    let schema = inner.store.schema().to_string();
    inner.registry.ensure_usable(&schema)
}

fn current_instance_id(inner: &Rc<RefCell<EngineInner>>) -> Result<String, EngineError> {
    inner
        .borrow()
        .store
        .instance_id()
        .map(str::to_string)
        .ok_or_else(|| EngineError::InvalidSelection("no instance loaded".to_string()))
}

fn serialize_body<T: serde::Serialize>(request: &T) -> Result<String, EngineError> {
    serde_json::to_string(request)
        .map_err(|e| EngineError::NetworkFailure(format!("request serialization: {}", e)))
}

async fn submit_update(client: &HttpClient, body: &str) -> Result<(), EngineError> {
    let (status, body) = client
        .post_json(protocol::UPDATE_INSTANCE_URL, body)
        .await?;
    ensure_success(status, &body)
}

fn ensure_success(status: u16, body: &str) -> Result<(), EngineError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(EngineError::NetworkFailure(format!(
            "update returned HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )))
    }
}
