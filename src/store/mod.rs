//! Span/link store and backend sync
//!
//! `SpanAnnotationStore` is the local source of truth for the current
//! instance's spans and links. The sync protocol is deliberately simple:
//! every mutation submits the entire current state (not a delta) and
//! treats the server acknowledgment as the trigger for a full reload, so
//! the client's view always converges to server truth. `protocol` holds
//! the pure request/response shapes; `http` is the fetch edge.

pub mod http;
pub mod protocol;

use crate::error::EngineError;
use crate::models::{Link, Span};
use protocol::{LinkUpdateRequest, SpanUpdateRequest};

pub use http::HttpClient;

/// Holds the current instance's spans and links and builds the sync
/// requests for mutations
///
/// The store never merges: `apply_load` replaces the whole local set, a
/// deliberate choice to avoid drift between tabs and instances.
pub struct SpanAnnotationStore {
    schema: String,
    instance_id: Option<String>,
    spans: Vec<Span>,
    links: Vec<Link>,
}

impl SpanAnnotationStore {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            instance_id: None,
            spans: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn find_span(&self, span_id: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.id == span_id)
    }

    /// Authoritative replacement of the entire local set (no merge).
    /// Absence of prior data upstream arrives here as empty vectors.
    pub fn apply_load(&mut self, instance_id: &str, spans: Vec<Span>, links: Vec<Link>) {
        let mismatched = spans
            .iter()
            .filter(|s| s.instance_id != instance_id)
            .count();
        if mismatched > 0 {
            log::warn!(
                "load for instance {} dropped {} spans belonging to another instance",
                instance_id,
                mismatched
            );
        }
        self.instance_id = Some(instance_id.to_string());
        self.spans = spans
            .into_iter()
            .filter(|s| s.instance_id == instance_id)
            .collect();
        self.links = links;
    }

    /// Instance-id guard: compare the locally-cached id against the
    /// authoritative current instance. On mismatch the whole local set
    /// is wiped (the caller must also clear overlay DOM) and `true` is
    /// returned.
    pub fn note_current_instance(&mut self, authoritative: &str) -> bool {
        match &self.instance_id {
            Some(cached) if cached == authoritative => false,
            Some(cached) => {
                log::warn!(
                    "instance id mismatch (cached {}, current {}), wiping local state",
                    cached,
                    authoritative
                );
                self.wipe();
                true
            }
            None => false,
        }
    }

    /// Mutation form of the instance-id guard: a stale tab must never
    /// submit a full-state update for an instance the server has moved
    /// past. On mismatch the local set is wiped and the mutation
    /// aborts with `InstanceMismatch`.
    pub fn ensure_instance(&mut self, authoritative: &str) -> Result<(), EngineError> {
        let cached = self.instance_id.clone();
        if self.note_current_instance(authoritative) {
            return Err(EngineError::InstanceMismatch {
                cached: cached.unwrap_or_default(),
                current: authoritative.to_string(),
            });
        }
        Ok(())
    }

    /// Drop all local spans and links
    pub fn wipe(&mut self) {
        self.instance_id = None;
        self.spans.clear();
        self.links.clear();
    }

    /// Reject empty/zero-length selections and missing label context
    /// before any network call is made
    pub fn validate_selection(
        &self,
        start: usize,
        end: usize,
        label: &str,
    ) -> Result<(), EngineError> {
        if start >= end {
            return Err(EngineError::InvalidSelection(format!(
                "empty selection {}..{}",
                start, end
            )));
        }
        if label.trim().is_empty() {
            return Err(EngineError::InvalidSelection("no label chosen".to_string()));
        }
        if self.instance_id.is_none() {
            return Err(EngineError::InvalidSelection(
                "no instance loaded".to_string(),
            ));
        }
        Ok(())
    }

    /// Full-state create request: the entire current span set plus the
    /// new span in one submission
    pub fn span_create_request(
        &self,
        start: usize,
        end: usize,
        label: &str,
    ) -> Result<SpanUpdateRequest, EngineError> {
        self.validate_selection(start, end, label)?;
        let instance_id = self
            .instance_id
            .as_ref()
            .ok_or_else(|| EngineError::InvalidSelection("no instance loaded".to_string()))?;
        Ok(protocol::build_span_create(
            &self.spans,
            start,
            end,
            label,
            &self.schema,
            instance_id,
        ))
    }

    /// Full-state delete request: current set with a "no value" sentinel
    /// on the removed `(label, start, end)` tuple
    pub fn span_delete_request(&self, span_id: &str) -> Result<SpanUpdateRequest, EngineError> {
        let instance_id = self
            .instance_id
            .as_ref()
            .ok_or_else(|| EngineError::InvalidSelection("no instance loaded".to_string()))?;
        let target = self.find_span(span_id).ok_or_else(|| {
            EngineError::InvalidSelection(format!("unknown span id {}", span_id))
        })?;
        Ok(protocol::build_span_delete(
            &self.spans,
            target,
            &self.schema,
            instance_id,
        ))
    }

    /// Link upsert request; endpoint position metadata is captured here
    /// so orphan repair has something to match after span recreation
    pub fn link_upsert_request(&self, mut link: Link) -> Result<LinkUpdateRequest, EngineError> {
        if !link.is_valid() {
            return Err(EngineError::InvalidSelection(
                "links need at least two spans".to_string(),
            ));
        }
        for span_id in &link.span_ids {
            if self.find_span(span_id).is_none() {
                return Err(EngineError::InvalidSelection(format!(
                    "link references unknown span {}",
                    span_id
                )));
            }
        }
        link.properties.endpoints = link
            .span_ids
            .iter()
            .filter_map(|id| self.find_span(id))
            .map(|s| crate::models::LinkEndpoint {
                span_id: s.id.clone(),
                start: s.start,
                end: s.end,
                label: s.label.clone(),
            })
            .collect();
        Ok(protocol::build_link_upsert(link))
    }
}
