//! Character-offset to pixel-geometry mapping
//!
//! This module maps a character range on the rendering surface to the
//! rectangles it occupies, one per visual line the range spans. The
//! surface's layout is only eventually consistent: immediately after a
//! text swap a rectangle query may transiently return nothing useful.
//! The bounded-retry stabilization policy wraps any `SurfaceProbe`
//! implementation, independent of a specific rendering engine's quirks.

pub mod dom;

use crate::error::EngineError;
use crate::models::Geometry;

pub use dom::DomSurfaceProbe;

/// Bounded-retry policy for geometry queries against an unsettled layout
///
/// The retry schedule is fixed and small; on exhaustion the mapper falls
/// back to the whole-range bounding box and finally reports the range as
/// unavailable rather than blocking.
#[derive(Clone, Copy, Debug)]
pub struct StabilizationPolicy {
    /// Forced-layout retries after the initial query
    pub max_retries: u32,
}

impl Default for StabilizationPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Rectangle source for one instance's text surface
///
/// The DOM implementation queries live `Range` client rects; tests use a
/// fake probe that settles after a configurable number of forced layouts.
pub trait SurfaceProbe {
    /// Rectangles covering `[start, end)`, container-relative, one per
    /// visual line. May transiently be empty or zero-sized.
    fn range_rects(&self, start: usize, end: usize) -> Vec<Geometry>;

    /// Bounding box of the whole range, the degraded single-rectangle
    /// fallback.
    fn range_bounding_box(&self, start: usize, end: usize) -> Option<Geometry>;

    /// Force a synchronous layout pass on the surface.
    fn force_layout(&self);
}

/// Maps character ranges to pixel rectangles under a stabilization policy
///
/// Given a stable layout the mapper is deterministic and side-effect-free
/// apart from the layout-forcing reads it performs.
pub struct OffsetToGeometryMapper<P: SurfaceProbe> {
    probe: P,
    policy: StabilizationPolicy,
}

impl<P: SurfaceProbe> OffsetToGeometryMapper<P> {
    pub fn new(probe: P, policy: StabilizationPolicy) -> Self {
        Self { probe, policy }
    }

    /// Resolve `[start, end)` to an ordered list of usable rectangles
    ///
    /// Queries immediately, then forces layout and retries up to the
    /// policy bound within the same call, then falls back to the bounding
    /// box of the whole range. `LayoutUnavailable` is the caller's cue to
    /// omit the span from the visual layer, never to crash.
    pub fn map_range(&self, start: usize, end: usize) -> Result<Vec<Geometry>, EngineError> {
        if start >= end {
            return Err(EngineError::LayoutUnavailable { start, end });
        }

        let mut rects = self.probe.range_rects(start, end);
        let mut attempts = 0;
        while !usable(&rects) && attempts < self.policy.max_retries {
            self.probe.force_layout();
            rects = self.probe.range_rects(start, end);
            attempts += 1;
        }

        if usable(&rects) {
            rects.retain(Geometry::is_usable);
            return Ok(rects);
        }

        if let Some(bbox) = self.probe.range_bounding_box(start, end) {
            if bbox.is_usable() {
                log::debug!(
                    "range {}..{} fell back to whole-range bounding box",
                    start,
                    end
                );
                return Ok(vec![bbox]);
            }
        }

        Err(EngineError::LayoutUnavailable { start, end })
    }
}

/// At least one rectangle with real extent
fn usable(rects: &[Geometry]) -> bool {
    rects.iter().any(Geometry::is_usable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Probe that returns nothing until `settles_after` forced layouts
    /// have happened, mimicking an engine whose layout lags a text swap.
    struct FakeProbe {
        settles_after: u32,
        forced: Cell<u32>,
        rects: Vec<Geometry>,
        bbox: Option<Geometry>,
    }

    impl FakeProbe {
        fn settled(rects: Vec<Geometry>) -> Self {
            Self {
                settles_after: 0,
                forced: Cell::new(0),
                rects,
                bbox: None,
            }
        }

        fn lagging(settles_after: u32, rects: Vec<Geometry>) -> Self {
            Self {
                settles_after,
                forced: Cell::new(0),
                rects,
                bbox: None,
            }
        }
    }

    impl SurfaceProbe for FakeProbe {
        fn range_rects(&self, _start: usize, _end: usize) -> Vec<Geometry> {
            if self.forced.get() >= self.settles_after {
                self.rects.clone()
            } else {
                vec![Geometry::default()]
            }
        }

        fn range_bounding_box(&self, _start: usize, _end: usize) -> Option<Geometry> {
            self.bbox
        }

        fn force_layout(&self) {
            self.forced.set(self.forced.get() + 1);
        }
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Geometry {
        Geometry::new(x, y, w, h)
    }

    #[test]
    fn test_settled_layout_resolves_immediately() {
        let probe = FakeProbe::settled(vec![rect(10.0, 0.0, 80.0, 18.0)]);
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy::default());
        let rects = mapper.map_range(0, 5).unwrap();
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].width, 80.0);
    }

    #[test]
    fn test_lagging_layout_resolves_within_retry_budget() {
        let probe = FakeProbe::lagging(2, vec![rect(0.0, 0.0, 40.0, 18.0)]);
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy { max_retries: 3 });
        let rects = mapper.map_range(0, 5).unwrap();
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn test_exhausted_retries_fall_back_to_bounding_box() {
        let mut probe = FakeProbe::lagging(10, vec![rect(0.0, 0.0, 40.0, 18.0)]);
        probe.bbox = Some(rect(0.0, 0.0, 200.0, 36.0));
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy { max_retries: 2 });
        let rects = mapper.map_range(0, 5).unwrap();
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].width, 200.0);
    }

    #[test]
    fn test_unavailable_when_nothing_resolves() {
        let probe = FakeProbe::lagging(10, vec![]);
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy { max_retries: 2 });
        match mapper.map_range(3, 9) {
            Err(EngineError::LayoutUnavailable { start, end }) => {
                assert_eq!((start, end), (3, 9));
            }
            other => panic!("expected LayoutUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_range_is_unavailable() {
        let probe = FakeProbe::settled(vec![rect(0.0, 0.0, 40.0, 18.0)]);
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy::default());
        assert!(mapper.map_range(5, 5).is_err());
    }

    #[test]
    fn test_zero_size_fragments_are_dropped() {
        let probe = FakeProbe::settled(vec![
            rect(0.0, 0.0, 40.0, 18.0),
            rect(0.0, 18.0, 0.0, 0.0),
            rect(0.0, 36.0, 25.0, 18.0),
        ]);
        let mapper = OffsetToGeometryMapper::new(probe, StabilizationPolicy::default());
        let rects = mapper.map_range(0, 20).unwrap();
        assert_eq!(rects.len(), 2);
    }
}
