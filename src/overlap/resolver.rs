//! Overlap graph construction and depth assignment
//!
//! `resolve_overlaps` is a pure function: the same span list always yields
//! the same record map, regardless of internal iteration order. Spans are
//! processed in ascending `start` order with ties broken by original list
//! position, which makes the depth relation acyclic and the fixpoint
//! guaranteed to converge; the iteration cap is a safety valve only.

use crate::models::{Span, SpanKey};
use std::collections::BTreeMap;

/// Height multiplier floor: a span with no overlap pressure renders at 1x
pub const BASE_MULTIPLIER: f32 = 1.0;

/// Height multiplier ceiling
pub const MAX_MULTIPLIER: f32 = 2.5;

/// Multiplier growth per containment nesting level
const CONTAINMENT_STEP: f32 = 0.4;

/// Deepest containment level that still grows the multiplier
const MAX_CONTAINMENT_LEVEL: u32 = 3;

/// Multiplier growth per mere-overlap neighbor (no containment either way)
const OVERLAP_STEP: f32 = 0.15;

/// Fixpoint iteration ceiling; hitting it logs a warning and accepts
/// current values rather than failing the render
const MAX_DEPTH_ITERATIONS: usize = 64;

/// Derived per-span overlap information
///
/// `depth` layers mutually overlapping spans onto distinct z-levels;
/// `height_multiplier` grows the overlay of spans that enclose (or crowd)
/// others so the nesting stays visible.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapRecord {
    pub span: Span,
    pub overlaps: Vec<SpanKey>,
    pub contains: Vec<SpanKey>,
    pub contained_by: Vec<SpanKey>,
    pub depth: u32,
    pub height_multiplier: f32,
}

/// Compute overlap records for one instance's spans, keyed by `(start, end)`
///
/// Spans sharing an interval collapse onto one record (first occurrence
/// wins, matching the stable tie-break). Pairwise comparison is O(n²);
/// per-instance span counts are expected to be small.
pub fn resolve_overlaps(spans: &[Span]) -> BTreeMap<SpanKey, OverlapRecord> {
    // Ascending start order, ties broken by original list position
    let mut ordered: Vec<&Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if !span.is_valid() {
            log::warn!(
                "skipping invalid span {}..{} ('{}')",
                span.start,
                span.end,
                span.label
            );
            continue;
        }
        if ordered.iter().any(|s| s.key() == span.key()) {
            continue;
        }
        ordered.push(span);
    }
    ordered.sort_by_key(|s| s.start);

    let mut records: BTreeMap<SpanKey, OverlapRecord> = BTreeMap::new();
    for span in &ordered {
        records.insert(
            span.key(),
            OverlapRecord {
                span: (*span).clone(),
                overlaps: Vec::new(),
                contains: Vec::new(),
                contained_by: Vec::new(),
                depth: 1,
                height_multiplier: BASE_MULTIPLIER,
            },
        );
    }

    // Pairwise overlap/containment graph; containment is a subset of
    // overlap and is recorded in both directions.
    for i in 0..ordered.len() {
        for j in (i + 1)..ordered.len() {
            let (a, b) = (ordered[i], ordered[j]);
            if !a.overlaps(b) {
                continue;
            }
            let (ka, kb) = (a.key(), b.key());
            records.get_mut(&ka).unwrap().overlaps.push(kb);
            records.get_mut(&kb).unwrap().overlaps.push(ka);
            if a.contains_span(b) {
                records.get_mut(&ka).unwrap().contains.push(kb);
                records.get_mut(&kb).unwrap().contained_by.push(ka);
            } else if b.contains_span(a) {
                records.get_mut(&kb).unwrap().contains.push(ka);
                records.get_mut(&ka).unwrap().contained_by.push(kb);
            }
        }
    }

    assign_depths(&ordered, &mut records);
    assign_multipliers(&mut records);

    records
}

/// Iterative depth fixpoint
///
/// Each span's depth is one more than the deepest overlap neighbor that
/// precedes it in processing order. Restricting the rule to predecessors
/// keeps the relation acyclic, so the fixpoint settles in at most one
/// pass per nesting level; the cap guards against non-termination anyway.
fn assign_depths(ordered: &[&Span], records: &mut BTreeMap<SpanKey, OverlapRecord>) {
    let keys: Vec<SpanKey> = ordered.iter().map(|s| s.key()).collect();
    let position: BTreeMap<SpanKey, usize> =
        keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let mut iterations = 0;
    loop {
        let mut changed = false;
        for key in &keys {
            let my_pos = position[key];
            let max_predecessor = records[key]
                .overlaps
                .iter()
                .filter(|n| position[*n] < my_pos)
                .map(|n| records[n].depth)
                .max();
            let depth = match max_predecessor {
                Some(d) => d + 1,
                None => 1,
            };
            let record = records.get_mut(key).unwrap();
            if record.depth != depth {
                record.depth = depth;
                changed = true;
            }
        }
        iterations += 1;
        if !changed {
            break;
        }
        if iterations >= MAX_DEPTH_ITERATIONS {
            log::warn!(
                "depth assignment hit iteration cap ({}); accepting current values",
                MAX_DEPTH_ITERATIONS
            );
            break;
        }
    }
}

/// Derive the height multiplier from the overlap graph
///
/// Containers grow with their deepest reachable containment level so an
/// outer span stays visible around everything nested inside it. Spans
/// that merely overlap (no containment either way) grow with the count
/// of such neighbors. Being contained by itself does not grow a span.
fn assign_multipliers(records: &mut BTreeMap<SpanKey, OverlapRecord>) {
    let keys: Vec<SpanKey> = records.keys().copied().collect();
    for key in &keys {
        let multiplier = if !records[key].contains.is_empty() {
            let level = containment_level(*key, records, 0);
            BASE_MULTIPLIER + CONTAINMENT_STEP * level.min(MAX_CONTAINMENT_LEVEL) as f32
        } else {
            let mere = records[key]
                .overlaps
                .iter()
                .filter(|n| {
                    !records[key].contains.contains(*n) && !records[key].contained_by.contains(*n)
                })
                .count();
            BASE_MULTIPLIER + OVERLAP_STEP * mere as f32
        };
        records.get_mut(key).unwrap().height_multiplier =
            multiplier.clamp(BASE_MULTIPLIER, MAX_MULTIPLIER);
    }
}

/// Deepest nesting level reachable via repeated containment
///
/// A leaf (contains nothing) is level 0. Proper containment forms a DAG,
/// so the recursion terminates; the fuel bound mirrors the multiplier cap.
fn containment_level(key: SpanKey, records: &BTreeMap<SpanKey, OverlapRecord>, fuel: u32) -> u32 {
    if fuel > MAX_CONTAINMENT_LEVEL {
        return MAX_CONTAINMENT_LEVEL;
    }
    records[&key]
        .contains
        .iter()
        .map(|child| 1 + containment_level(*child, records, fuel + 1))
        .max()
        .unwrap_or(0)
}
