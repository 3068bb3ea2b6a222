//! Connective path planning for links
//!
//! Pure geometry: given links and the overlay renderer's last-known span
//! geometries, plan SVG path data for every drawable link plus the height
//! of the reserved spacer region above the text. Spacer sizing happens
//! before any path coordinates are finalized, since paths rise into it.

use crate::models::{Geometry, Link, LinkDirection, Span};
use std::collections::{HashMap, HashSet};

/// Anchors whose vertical positions differ by no more than this are
/// treated as lying on the same visual line
pub const SAME_LINE_TOLERANCE: f32 = 6.0;

/// Curve height as a fraction of horizontal anchor distance
const CURVE_HEIGHT_RATIO: f32 = 0.18;

const MIN_CURVE_HEIGHT: f32 = 14.0;
const MAX_CURVE_HEIGHT: f32 = 60.0;

/// Vertical clearance of a bracket's horizontal segment above the
/// higher anchor
const BRACKET_TOP_OFFSET: f32 = 28.0;

const BRACKET_CORNER_RADIUS: f32 = 6.0;

/// Vertical clearance of a star centroid above its highest anchor
const STAR_CENTROID_OFFSET: f32 = 32.0;

/// Extra margin added to the maximum required arc height
const SPACER_MARGIN: f32 = 12.0;

const ARROW_HALF_WIDTH: f32 = 4.0;
const ARROW_LENGTH: f32 = 7.0;

/// Path anchor at the horizontal center of a span's first rectangle
#[derive(Clone, Debug, PartialEq)]
pub struct Anchor {
    pub span_id: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    /// Pair link on one visual line: quadratic curve
    Curve,
    /// Pair link across lines: orthogonal bracket
    Bracket,
    /// N-ary link: star topology to a centroid marker
    Star,
}

/// Link-type text placed at a path's apex, with a background patch
#[derive(Clone, Debug, PartialEq)]
pub struct LabelPlan {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// One planned connective path
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPath {
    pub link_id: String,
    pub kind: PathKind,
    /// SVG path data; for stars, all rays in one path
    pub d: String,
    /// Arrowhead path data at the terminal end of directed links
    pub arrow: Option<String>,
    /// Star centroid marker position
    pub marker: Option<(f32, f32)>,
    pub label: Option<LabelPlan>,
}

/// Planned paths plus the spacer height they require
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LinkPlan {
    pub paths: Vec<PlannedPath>,
    pub spacer_height: f32,
}

/// Plan connective paths for all drawable links
///
/// Links whose endpoints cannot be resolved (even after orphan repair)
/// are retained in data but simply not drawn.
pub fn plan_links(
    links: &[Link],
    geometries: &HashMap<String, Vec<Geometry>>,
    spans: &[Span],
    show_labels: bool,
) -> LinkPlan {
    let mut drawable: Vec<(&Link, Vec<Anchor>)> = Vec::new();
    for link in links {
        if !link.is_valid() {
            log::warn!("link {} has fewer than two endpoints, skipping", link.id);
            continue;
        }
        let resolved = match resolve_link_spans(link, spans) {
            Some(ids) => ids,
            None => {
                log::debug!("link {} endpoints unresolved, not drawn", link.id);
                continue;
            }
        };
        let anchors: Option<Vec<Anchor>> = resolved
            .iter()
            .map(|id| anchor_for(id, geometries))
            .collect();
        match anchors {
            Some(anchors) => drawable.push((link, anchors)),
            None => log::debug!("link {} has endpoints without geometry, not drawn", link.id),
        }
    }

    // Spacer must be sized before coordinates are finalized
    let max_height = drawable
        .iter()
        .map(|(_, anchors)| required_height(anchors))
        .fold(0.0f32, f32::max);
    let spacer_height = if drawable.is_empty() {
        0.0
    } else {
        max_height + SPACER_MARGIN
    };

    let paths = drawable
        .into_iter()
        .map(|(link, anchors)| plan_one(link, &anchors, show_labels))
        .collect();

    LinkPlan {
        paths,
        spacer_height,
    }
}

/// Arc height a link needs above its anchors
pub fn required_height(anchors: &[Anchor]) -> f32 {
    if anchors.len() == 2 {
        if same_line(&anchors[0], &anchors[1]) {
            curve_height(anchors[1].x - anchors[0].x)
        } else {
            BRACKET_TOP_OFFSET
        }
    } else {
        STAR_CENTROID_OFFSET
    }
}

/// Resolve a link's span ids against the current span set
///
/// Missing ids are repaired from the persisted `(start, end, label)`
/// endpoint metadata, falling back to matching by label alone against
/// any unclaimed span. Each candidate span is claimed at most once per
/// link. Returns `None` when any endpoint stays unresolved.
pub fn resolve_link_spans(link: &Link, spans: &[Span]) -> Option<Vec<String>> {
    let current: HashSet<&str> = spans.iter().map(|s| s.id.as_str()).collect();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut resolved = Vec::with_capacity(link.span_ids.len());

    for span_id in &link.span_ids {
        if current.contains(span_id.as_str()) {
            claimed.insert(span_id.clone());
            resolved.push(span_id.clone());
            continue;
        }

        let endpoint = link
            .properties
            .endpoints
            .iter()
            .find(|e| &e.span_id == span_id)?;

        let by_position = spans.iter().find(|s| {
            !claimed.contains(&s.id)
                && s.start == endpoint.start
                && s.end == endpoint.end
                && s.label == endpoint.label
        });
        let matched = by_position.or_else(|| {
            spans
                .iter()
                .find(|s| !claimed.contains(&s.id) && s.label == endpoint.label)
        })?;

        log::debug!(
            "link {}: repaired endpoint {} -> {}",
            link.id,
            span_id,
            matched.id
        );
        claimed.insert(matched.id.clone());
        resolved.push(matched.id.clone());
    }

    Some(resolved)
}

fn anchor_for(span_id: &str, geometries: &HashMap<String, Vec<Geometry>>) -> Option<Anchor> {
    let rect = geometries.get(span_id)?.first()?;
    Some(Anchor {
        span_id: span_id.to_string(),
        x: rect.center_x(),
        y: rect.y,
    })
}

fn same_line(a: &Anchor, b: &Anchor) -> bool {
    (a.y - b.y).abs() <= SAME_LINE_TOLERANCE
}

/// Curve height scales with anchor distance, clamped to a maximum
pub(crate) fn curve_height(dx: f32) -> f32 {
    (dx.abs() * CURVE_HEIGHT_RATIO).clamp(MIN_CURVE_HEIGHT, MAX_CURVE_HEIGHT)
}

/// Quadratic control point for a same-line pair, strictly above both
/// anchors
pub(crate) fn curve_control_point(a: &Anchor, b: &Anchor) -> (f32, f32) {
    let height = curve_height(b.x - a.x);
    ((a.x + b.x) / 2.0, a.y.min(b.y) - height)
}

fn plan_one(link: &Link, anchors: &[Anchor], show_labels: bool) -> PlannedPath {
    let (kind, d, apex, terminal) = if anchors.len() == 2 && same_line(&anchors[0], &anchors[1]) {
        let (a, b) = (&anchors[0], &anchors[1]);
        let (cx, cy) = curve_control_point(a, b);
        let d = format!("M {} {} Q {} {} {} {}", a.x, a.y, cx, cy, b.x, b.y);
        // Quadratic apex at t = 0.5
        let apex = (cx, (a.y + 2.0 * cy + b.y) / 4.0);
        (PathKind::Curve, d, apex, b.clone())
    } else if anchors.len() == 2 {
        let (a, b) = (&anchors[0], &anchors[1]);
        let d = bracket_path(a, b);
        let top = a.y.min(b.y) - BRACKET_TOP_OFFSET;
        let apex = ((a.x + b.x) / 2.0, top);
        (PathKind::Bracket, d, apex, b.clone())
    } else {
        let cx = anchors.iter().map(|p| p.x).sum::<f32>() / anchors.len() as f32;
        let top = anchors.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let cy = top - STAR_CENTROID_OFFSET;
        let mut d = String::new();
        for anchor in anchors {
            d.push_str(&format!("M {} {} L {} {} ", anchor.x, anchor.y, cx, cy));
        }
        let terminal = anchors.last().expect("n-ary link has anchors").clone();
        (PathKind::Star, d.trim_end().to_string(), (cx, cy), terminal)
    };

    let arrow = if link.direction == LinkDirection::Directed {
        Some(arrow_head(&terminal))
    } else {
        None
    };

    let marker = if kind == PathKind::Star {
        Some(apex)
    } else {
        None
    };

    let label = if show_labels {
        Some(LabelPlan {
            text: link.link_type.clone(),
            x: apex.0,
            y: apex.1,
        })
    } else {
        None
    };

    PlannedPath {
        link_id: link.id.clone(),
        kind,
        d,
        arrow,
        marker,
        label,
    }
}

/// Orthogonal bracket for a cross-line pair, drawn left to right with
/// rounded corners; x-order decides which anchor's riser comes first
fn bracket_path(a: &Anchor, b: &Anchor) -> String {
    let (left, right) = if a.x <= b.x { (a, b) } else { (b, a) };
    let top = a.y.min(b.y) - BRACKET_TOP_OFFSET;
    let r = BRACKET_CORNER_RADIUS;
    format!(
        "M {} {} L {} {} Q {} {} {} {} L {} {} Q {} {} {} {} L {} {}",
        left.x,
        left.y,
        left.x,
        top + r,
        left.x,
        top,
        left.x + r,
        top,
        right.x - r,
        top,
        right.x,
        top,
        right.x,
        top + r,
        right.x,
        right.y,
    )
}

/// Arrowhead at a directed link's terminal anchor; paths approach their
/// anchors from above
fn arrow_head(tip: &Anchor) -> String {
    format!(
        "M {} {} L {} {} L {} {} Z",
        tip.x,
        tip.y,
        tip.x - ARROW_HALF_WIDTH,
        tip.y - ARROW_LENGTH,
        tip.x + ARROW_HALF_WIDTH,
        tip.y - ARROW_LENGTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkEndpoint, LinkProperties};

    fn span(id: &str, label: &str, start: usize, end: usize) -> Span {
        Span::new(id, "i1", "ner", label, start, end)
    }

    fn link(id: &str, span_ids: &[&str], direction: LinkDirection) -> Link {
        Link {
            id: id.to_string(),
            schema: "ner".to_string(),
            link_type: "coref".to_string(),
            span_ids: span_ids.iter().map(|s| s.to_string()).collect(),
            direction,
            properties: LinkProperties::default(),
        }
    }

    fn geometries(entries: &[(&str, Geometry)]) -> HashMap<String, Vec<Geometry>> {
        entries
            .iter()
            .map(|(id, g)| (id.to_string(), vec![*g]))
            .collect()
    }

    fn rect(x: f32, y: f32) -> Geometry {
        Geometry::new(x, y, 40.0, 18.0)
    }

    #[test]
    fn test_same_line_curve_bends_upward() {
        let a = Anchor {
            span_id: "a".to_string(),
            x: 100.0,
            y: 50.0,
        };
        let b = Anchor {
            span_id: "b".to_string(),
            x: 300.0,
            y: 50.0,
        };
        let (cx, cy) = curve_control_point(&a, &b);
        assert_eq!(cx, 200.0);
        assert!(cy < a.y, "control point must lie strictly above anchors");
    }

    #[test]
    fn test_curve_height_clamped() {
        assert_eq!(curve_height(2.0), 14.0);
        assert_eq!(curve_height(10_000.0), 60.0);
        let mid = curve_height(200.0);
        assert!(mid > 14.0 && mid < 60.0);
    }

    #[test]
    fn test_spacer_grows_with_anchor_distance() {
        let spans = vec![span("a", "A", 0, 4), span("b", "B", 10, 14)];
        let links = vec![link("l1", &["a", "b"], LinkDirection::Undirected)];

        let near = plan_links(
            &links,
            &geometries(&[("a", rect(0.0, 40.0)), ("b", rect(60.0, 40.0))]),
            &spans,
            true,
        );
        let far = plan_links(
            &links,
            &geometries(&[("a", rect(0.0, 40.0)), ("b", rect(400.0, 40.0))]),
            &spans,
            true,
        );
        assert!(far.spacer_height >= near.spacer_height);
        assert!(near.spacer_height > 0.0);
    }

    #[test]
    fn test_cross_line_pair_uses_bracket() {
        let spans = vec![span("a", "A", 0, 4), span("b", "B", 50, 54)];
        let links = vec![link("l1", &["b", "a"], LinkDirection::Undirected)];
        let plan = plan_links(
            &links,
            &geometries(&[("a", rect(200.0, 20.0)), ("b", rect(30.0, 80.0))]),
            &spans,
            true,
        );
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.paths[0].kind, PathKind::Bracket);
        // Drawn left to right regardless of endpoint order
        assert!(plan.paths[0].d.starts_with("M 50 80"));
    }

    #[test]
    fn test_nary_link_uses_star_with_marker() {
        let spans = vec![
            span("a", "A", 0, 4),
            span("b", "B", 10, 14),
            span("c", "C", 20, 24),
        ];
        let links = vec![link("l1", &["a", "b", "c"], LinkDirection::Undirected)];
        let plan = plan_links(
            &links,
            &geometries(&[
                ("a", rect(0.0, 40.0)),
                ("b", rect(100.0, 40.0)),
                ("c", rect(200.0, 40.0)),
            ]),
            &spans,
            true,
        );
        assert_eq!(plan.paths[0].kind, PathKind::Star);
        let (cx, cy) = plan.paths[0].marker.expect("star has centroid marker");
        assert_eq!(cx, (20.0 + 120.0 + 220.0) / 3.0);
        assert!(cy < 40.0);
    }

    #[test]
    fn test_arrowhead_only_on_directed_links() {
        let spans = vec![span("a", "A", 0, 4), span("b", "B", 10, 14)];
        let geoms = geometries(&[("a", rect(0.0, 40.0)), ("b", rect(100.0, 40.0))]);

        let directed = vec![link("l1", &["a", "b"], LinkDirection::Directed)];
        let undirected = vec![link("l2", &["a", "b"], LinkDirection::Undirected)];
        assert!(plan_links(&directed, &geoms, &spans, true).paths[0]
            .arrow
            .is_some());
        assert!(plan_links(&undirected, &geoms, &spans, true).paths[0]
            .arrow
            .is_none());
    }

    #[test]
    fn test_labels_omitted_when_disabled() {
        let spans = vec![span("a", "A", 0, 4), span("b", "B", 10, 14)];
        let geoms = geometries(&[("a", rect(0.0, 40.0)), ("b", rect(100.0, 40.0))]);
        let links = vec![link("l1", &["a", "b"], LinkDirection::Undirected)];
        assert!(plan_links(&links, &geoms, &spans, false).paths[0]
            .label
            .is_none());
        assert_eq!(
            plan_links(&links, &geoms, &spans, true).paths[0]
                .label
                .as_ref()
                .map(|l| l.text.as_str()),
            Some("coref")
        );
    }

    #[test]
    fn test_orphan_repaired_by_position_metadata() {
        // "old-b" vanished; a recreated span with the same tuple exists
        let spans = vec![span("a", "A", 0, 4), span("new-b", "B", 10, 14)];
        let mut orphaned = link("l1", &["a", "old-b"], LinkDirection::Undirected);
        orphaned.properties = LinkProperties {
            endpoints: vec![LinkEndpoint {
                span_id: "old-b".to_string(),
                start: 10,
                end: 14,
                label: "B".to_string(),
            }],
        };
        let resolved = resolve_link_spans(&orphaned, &spans).unwrap();
        assert_eq!(resolved, vec!["a".to_string(), "new-b".to_string()]);
    }

    #[test]
    fn test_orphan_repaired_by_label_fallback() {
        // Position moved, but a span with the stored label exists
        let spans = vec![span("a", "A", 0, 4), span("new-b", "B", 30, 36)];
        let mut orphaned = link("l1", &["a", "old-b"], LinkDirection::Undirected);
        orphaned.properties = LinkProperties {
            endpoints: vec![LinkEndpoint {
                span_id: "old-b".to_string(),
                start: 10,
                end: 14,
                label: "B".to_string(),
            }],
        };
        let resolved = resolve_link_spans(&orphaned, &spans).unwrap();
        assert_eq!(resolved[1], "new-b");
    }

    #[test]
    fn test_unresolved_link_not_drawn() {
        let spans = vec![span("a", "A", 0, 4)];
        let links = vec![link("l1", &["a", "gone"], LinkDirection::Undirected)];
        let plan = plan_links(&links, &geometries(&[("a", rect(0.0, 40.0))]), &spans, true);
        assert!(plan.paths.is_empty());
        assert_eq!(plan.spacer_height, 0.0);
    }

    #[test]
    fn test_repair_claims_each_span_once() {
        // Two orphaned endpoints with the same label must not both bind
        // to the same span
        let spans = vec![span("x", "B", 10, 14)];
        let mut orphaned = link("l1", &["old-1", "old-2"], LinkDirection::Undirected);
        orphaned.properties = LinkProperties {
            endpoints: vec![
                LinkEndpoint {
                    span_id: "old-1".to_string(),
                    start: 10,
                    end: 14,
                    label: "B".to_string(),
                },
                LinkEndpoint {
                    span_id: "old-2".to_string(),
                    start: 20,
                    end: 24,
                    label: "B".to_string(),
                },
            ],
        };
        assert!(resolve_link_spans(&orphaned, &spans).is_none());
    }
}
