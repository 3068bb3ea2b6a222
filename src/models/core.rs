//! Core data structures for span annotation
//!
//! Spans are labeled character-offset intervals over one instance's
//! plain-text buffer. Links relate two or more spans. Geometry is the
//! pixel-space projection of a span onto the rendering surface; it is
//! derived at render time and never persisted.

use serde::{Deserialize, Serialize};

/// A labeled character-offset interval `[start, end)` over one instance's text
///
/// Offsets index into the instance's canonical plain-text buffer. The id is
/// assigned by the backend; locally constructed spans carry an empty id until
/// the post-mutation reload replaces them with server truth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Span {
    /// Backend-assigned identifier
    pub id: String,

    /// Instance (document) this span belongs to
    #[serde(rename = "instanceId")]
    pub instance_id: String,

    /// Annotation schema this span was created under
    pub schema: String,

    /// Label text chosen by the annotator
    pub label: String,

    /// Start offset (inclusive) into the instance text
    pub start: usize,

    /// End offset (exclusive) into the instance text
    pub end: usize,
}

impl Span {
    pub fn new(
        id: impl Into<String>,
        instance_id: impl Into<String>,
        schema: impl Into<String>,
        label: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            id: id.into(),
            instance_id: instance_id.into(),
            schema: schema.into(),
            label: label.into(),
            start,
            end,
        }
    }

    /// Check that this span is a valid interval (start < end)
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Key identifying this span's interval in resolver output
    pub fn key(&self) -> SpanKey {
        SpanKey {
            start: self.start,
            end: self.end,
        }
    }

    /// Symmetric overlap test: `A.start < B.end && B.start < A.end`
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Proper containment: this span encloses `other` and they are not
    /// the same interval. Identical intervals overlap but neither
    /// contains the other.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start
            && self.end >= other.end
            && (self.start < other.start || self.end > other.end)
    }
}

/// Interval key `(start, end)` used to index resolver output
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanKey {
    pub start: usize,
    pub end: usize,
}

/// Direction of a link between spans
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    Directed,
    Undirected,
}

/// Persisted position metadata for one link endpoint
///
/// Used by orphan repair: when a referenced span id no longer exists
/// (spans are recreated wholesale on instance reload), the endpoint's
/// `(start, end, label)` tuple is matched against the current span set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkEndpoint {
    #[serde(rename = "spanId")]
    pub span_id: String,
    pub start: usize,
    pub end: usize,
    pub label: String,
}

/// Additional persisted link properties
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct LinkProperties {
    /// Position metadata per endpoint, parallel to `span_ids`
    #[serde(default)]
    pub endpoints: Vec<LinkEndpoint>,
}

/// A persisted relation between two or more spans
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Link {
    pub id: String,

    pub schema: String,

    /// Relation type label (e.g. "coref", "causes")
    #[serde(rename = "linkType")]
    pub link_type: String,

    /// Referenced span ids, at least two
    #[serde(rename = "spanIds")]
    pub span_ids: Vec<String>,

    pub direction: LinkDirection,

    #[serde(default)]
    pub properties: LinkProperties,
}

impl Link {
    /// Links need at least two endpoints to be drawable
    pub fn is_valid(&self) -> bool {
        self.span_ids.len() >= 2
    }

    /// Pair links get curves/brackets, n-ary links get a star topology
    pub fn is_pair(&self) -> bool {
        self.span_ids.len() == 2
    }
}

/// A pixel rectangle relative to the reference container
///
/// One span may produce several geometries when its range wraps across
/// visual lines.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Geometry {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A zero-size rectangle carries no usable layout information
    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Horizontal center, the anchor x for connective paths
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Per-schema display configuration consumed by the renderers
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SchemaConfig {
    /// Schema name, the registry key
    pub schema: String,

    /// Fixed overlay color; falls back to the label palette when absent
    #[serde(default)]
    pub color: Option<String>,

    /// Whether link-type labels are drawn at arc apexes
    #[serde(rename = "showLinkLabels", default = "default_show_link_labels")]
    pub show_link_labels: bool,
}

fn default_show_link_labels() -> bool {
    true
}

impl SchemaConfig {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            color: None,
            show_link_labels: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new("s", "i1", "ner", "LABEL", start, end)
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = span(0, 10);
        let b = span(5, 15);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        let a = span(0, 5);
        let b = span(5, 10);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_containment_is_proper() {
        let outer = span(0, 20);
        let inner = span(5, 10);
        assert!(outer.contains_span(&inner));
        assert!(!inner.contains_span(&outer));

        // Identical intervals overlap but neither contains the other
        let twin = span(0, 20);
        assert!(outer.overlaps(&twin));
        assert!(!outer.contains_span(&twin));
        assert!(!twin.contains_span(&outer));
    }

    #[test]
    fn test_shared_edge_containment() {
        let outer = span(0, 10);
        let inner = span(0, 5);
        assert!(outer.contains_span(&inner));
        assert!(!inner.contains_span(&outer));
    }

    #[test]
    fn test_link_validity() {
        let link = Link {
            id: "l1".to_string(),
            schema: "ner".to_string(),
            link_type: "coref".to_string(),
            span_ids: vec!["a".to_string()],
            direction: LinkDirection::Undirected,
            properties: LinkProperties::default(),
        };
        assert!(!link.is_valid());
    }
}
