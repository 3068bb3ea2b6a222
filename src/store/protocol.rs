//! REST contract types and request builders
//!
//! Pure shapes for the backend protocol: span/link fetch responses, the
//! full-state `/updateinstance` submission, and the authoritative
//! current-instance lookup. Parsing normalizes a 404 span/link fetch to
//! an empty set rather than an error.

use crate::error::EngineError;
use crate::models::{Link, Span};
use serde::{Deserialize, Serialize};

pub const UPDATE_INSTANCE_URL: &str = "/updateinstance";
pub const CURRENT_INSTANCE_URL: &str = "/api/current_instance";

pub fn spans_url(instance_id: &str) -> String {
    format!("/api/spans/{}", instance_id)
}

pub fn links_url(instance_id: &str) -> String {
    format!("/api/links/{}", instance_id)
}

pub fn link_delete_url(instance_id: &str, link_id: &str) -> String {
    format!("/api/links/{}/{}", instance_id, link_id)
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SpansResponse {
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct LinksResponse {
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CurrentInstanceResponse {
    pub instance_id: String,
}

/// One span's entry in a full-state submission
///
/// `value: None` is the "no value" sentinel signaling removal of the
/// `(name, start, end)` tuple; present spans carry their label as the
/// value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpanState {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub title: String,
    pub value: Option<String>,
}

impl SpanState {
    fn present(span: &Span) -> Self {
        Self {
            name: span.label.clone(),
            start: span.start,
            end: span.end,
            title: span.label.clone(),
            value: Some(span.label.clone()),
        }
    }

    fn removed(span: &Span) -> Self {
        Self {
            value: None,
            ..Self::present(span)
        }
    }
}

/// POST /updateinstance body for span mutations: the entire current
/// state, not a delta
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpanUpdateRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub schema: String,
    pub state: Vec<SpanState>,
    pub instance_id: String,
}

/// POST /updateinstance body for link upserts
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkUpdateRequest {
    pub annotations: serde_json::Map<String, serde_json::Value>,
    pub link_annotations: Vec<Link>,
}

/// Entire current span set plus the new span, in one request
pub fn build_span_create(
    current: &[Span],
    start: usize,
    end: usize,
    label: &str,
    schema: &str,
    instance_id: &str,
) -> SpanUpdateRequest {
    let mut state: Vec<SpanState> = current.iter().map(SpanState::present).collect();
    state.push(SpanState {
        name: label.to_string(),
        start,
        end,
        title: label.to_string(),
        value: Some(label.to_string()),
    });
    SpanUpdateRequest {
        kind: "span".to_string(),
        schema: schema.to_string(),
        state,
        instance_id: instance_id.to_string(),
    }
}

/// Entire current span set with the target tuple marked for removal
pub fn build_span_delete(
    current: &[Span],
    target: &Span,
    schema: &str,
    instance_id: &str,
) -> SpanUpdateRequest {
    let state = current
        .iter()
        .map(|span| {
            if span.label == target.label && span.start == target.start && span.end == target.end {
                SpanState::removed(span)
            } else {
                SpanState::present(span)
            }
        })
        .collect();
    SpanUpdateRequest {
        kind: "span".to_string(),
        schema: schema.to_string(),
        state,
        instance_id: instance_id.to_string(),
    }
}

pub fn build_link_upsert(link: Link) -> LinkUpdateRequest {
    LinkUpdateRequest {
        annotations: serde_json::Map::new(),
        link_annotations: vec![link],
    }
}

/// Decode a span fetch; 404 means "no annotations yet", not an error
pub fn parse_spans(status: u16, body: &str) -> Result<Vec<Span>, EngineError> {
    if status == 404 {
        return Ok(Vec::new());
    }
    if !(200..300).contains(&status) {
        return Err(EngineError::NetworkFailure(format!(
            "span fetch returned HTTP {}",
            status
        )));
    }
    let response: SpansResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::NetworkFailure(format!("bad span response: {}", e)))?;
    Ok(response.spans)
}

/// Decode a link fetch with the same 404 normalization
pub fn parse_links(status: u16, body: &str) -> Result<Vec<Link>, EngineError> {
    if status == 404 {
        return Ok(Vec::new());
    }
    if !(200..300).contains(&status) {
        return Err(EngineError::NetworkFailure(format!(
            "link fetch returned HTTP {}",
            status
        )));
    }
    let response: LinksResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::NetworkFailure(format!("bad link response: {}", e)))?;
    Ok(response.links)
}

pub fn parse_current_instance(status: u16, body: &str) -> Result<String, EngineError> {
    if !(200..300).contains(&status) {
        return Err(EngineError::NetworkFailure(format!(
            "current-instance fetch returned HTTP {}",
            status
        )));
    }
    let response: CurrentInstanceResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::NetworkFailure(format!("bad current-instance response: {}", e)))?;
    Ok(response.instance_id)
}
