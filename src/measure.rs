//! Geometry measurement through a hidden mirror surface
//!
//! The mirror replicates the viewport's text-affecting metrics and holds a
//! laid-out copy of the current snapshot. Ranges are measured on the
//! mirror in its own (off-screen) coordinates and translated back into
//! content-local coordinates of the live viewport.

use crate::coordinates::{LayoutPos, LayoutRect, Position, StyleMetrics};
use crate::font::{ShapedText, TypesettingOracle};
use crate::snapshot::{SnapshotId, TextSnapshot};

/// Where mirrors are placed by default, well away from anything visible
pub const DEFAULT_MIRROR_ORIGIN: LayoutPos = LayoutPos::new(-9999.0, -9999.0);

/// Laid-out copy of one snapshot under one set of metrics
pub struct MirrorSurface {
    metrics: StyleMetrics,
    origin: LayoutPos,
    content: Option<(SnapshotId, ShapedText)>,
}

impl MirrorSurface {
    fn new(metrics: StyleMetrics, origin: LayoutPos) -> Self {
        Self {
            metrics,
            origin,
            content: None,
        }
    }

    pub fn metrics(&self) -> &StyleMetrics {
        &self.metrics
    }

    pub fn origin(&self) -> LayoutPos {
        self.origin
    }

    /// Top-left of the mirror's content box in its own coordinates
    pub fn content_origin(&self) -> LayoutPos {
        let offset = self.metrics.content_offset();
        LayoutPos::new(self.origin.x + offset.x, self.origin.y + offset.y)
    }

    pub fn content_id(&self) -> Option<SnapshotId> {
        self.content.as_ref().map(|(id, _)| *id)
    }

    /// Reset content to `snapshot` unless it already holds it
    ///
    /// Returns true when the content was (re)laid out.
    fn sync<O: TypesettingOracle + ?Sized>(&mut self, oracle: &O, snapshot: &TextSnapshot) -> bool {
        if self.content_id() == Some(snapshot.id()) {
            return false;
        }
        let shaped = oracle.shape(snapshot.text(), &self.metrics);
        self.content = Some((snapshot.id(), shaped));
        true
    }

    /// Bounding rectangle of `[start, end)` in the mirror's own coordinates
    fn client_rect(&self, start: usize, end: usize) -> Option<LayoutRect> {
        let (_, shaped) = self.content.as_ref()?;
        let rect = shaped.range_rect(start, end)?;
        let content = self.content_origin();
        Some(rect.translate(content.x, content.y))
    }
}

/// Counters for tests and debug output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeasureStats {
    pub mirrors_created: u64,
    pub content_resets: u64,
    pub measurements: u64,
    pub failures: u64,
}

/// Maps text ranges of a snapshot to pixel rectangles
pub struct GeometryMeasurer<O> {
    oracle: O,
    mirror: Option<MirrorSurface>,
    mirror_origin: LayoutPos,
    stats: MeasureStats,
}

impl<O: TypesettingOracle> GeometryMeasurer<O> {
    pub fn new(oracle: O) -> Self {
        Self::with_mirror_origin(oracle, DEFAULT_MIRROR_ORIGIN)
    }

    pub fn with_mirror_origin(oracle: O, mirror_origin: LayoutPos) -> Self {
        Self {
            oracle,
            mirror: None,
            mirror_origin,
            stats: MeasureStats::default(),
        }
    }

    /// Rectangle of `[start, end)` in content-local coordinates
    ///
    /// `None` when the range can't be resolved; the caller skips the match.
    pub fn measure(
        &mut self,
        metrics: &StyleMetrics,
        snapshot: &TextSnapshot,
        start: usize,
        end: usize,
    ) -> Option<Position> {
        self.stats.measurements += 1;

        let stale = self.mirror.as_ref().map_or(true, |m| m.metrics != *metrics);
        if stale {
            if self.mirror.is_some() {
                tracing::debug!("style metrics changed, recreating mirror");
            }
            self.mirror = Some(MirrorSurface::new(metrics.clone(), self.mirror_origin));
            self.stats.mirrors_created += 1;
        }

        let oracle = &self.oracle;
        let mirror = self.mirror.as_mut()?;
        if mirror.sync(oracle, snapshot) {
            self.stats.content_resets += 1;
        }

        let Some(client) = mirror.client_rect(start, end) else {
            self.stats.failures += 1;
            return None;
        };

        // Mirror coordinates back to the live viewport's content-local space
        let mirror_content = mirror.content_origin();
        let offset = metrics.content_offset();
        Some(Position::from(client.translate(
            offset.x - mirror_content.x,
            offset.y - mirror_content.y,
        )))
    }

    /// Drop the mirror; the next measurement builds a fresh one
    pub fn invalidate(&mut self) {
        self.mirror = None;
    }

    pub fn mirror(&self) -> Option<&MirrorSurface> {
        self.mirror.as_ref()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn stats(&self) -> MeasureStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::Edges;
    use crate::font::MonospaceOracle;

    fn metrics() -> StyleMetrics {
        let mut m = StyleMetrics::new(10.0).with_width(200.0);
        m.char_width = 10.0;
        m.line_height = 20.0;
        m
    }

    #[test]
    fn test_measure_is_content_local() {
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let snapshot = TextSnapshot::capture("abc (2330-TW) def");

        let position = measurer.measure(&metrics(), &snapshot, 5, 9).unwrap();
        assert_eq!(
            position,
            Position {
                top: 0.0,
                left: 50.0,
                width: 40.0,
                height: 20.0
            }
        );
    }

    #[test]
    fn test_padding_and_border_offset() {
        let mut m = metrics();
        m.padding = Edges::uniform(4.0);
        m.border = Edges::uniform(1.0);
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let snapshot = TextSnapshot::capture("ab");

        let position = measurer.measure(&m, &snapshot, 1, 2).unwrap();
        assert_eq!(position.left, 15.0);
        assert_eq!(position.top, 5.0);
    }

    #[test]
    fn test_content_reset_once_per_snapshot() {
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let m = metrics();
        let first = TextSnapshot::capture("one two three");

        measurer.measure(&m, &first, 0, 3);
        measurer.measure(&m, &first, 4, 7);
        measurer.measure(&m, &first, 8, 13);
        assert_eq!(measurer.stats().content_resets, 1);
        assert_eq!(measurer.stats().mirrors_created, 1);

        let second = TextSnapshot::capture("one two three!");
        measurer.measure(&m, &second, 0, 3);
        assert_eq!(measurer.stats().content_resets, 2);
        assert_eq!(measurer.mirror().and_then(|m| m.content_id()), Some(second.id()));
    }

    #[test]
    fn test_metrics_change_recreates_mirror() {
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let snapshot = TextSnapshot::capture("hello wonderful world");

        let wide = measurer.measure(&metrics(), &snapshot, 6, 15).unwrap();
        assert_eq!(wide.top, 0.0);

        // 10 columns per line now, "wonderful" wraps to line 1
        let narrow = measurer.measure(&metrics().with_width(100.0), &snapshot, 6, 15).unwrap();
        assert_eq!(narrow.top, 20.0);
        assert_eq!(narrow.left, 0.0);
        assert_eq!(measurer.stats().mirrors_created, 2);
    }

    #[test]
    fn test_unresolvable_range_is_none() {
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let empty = TextSnapshot::capture("");
        assert!(measurer.measure(&metrics(), &empty, 0, 1).is_none());

        let snapshot = TextSnapshot::capture("abc");
        assert!(measurer.measure(&metrics(), &snapshot, 2, 10).is_none());
        assert_eq!(measurer.stats().failures, 2);
    }

    #[test]
    fn test_invalidate_rebuilds_lazily() {
        let mut measurer = GeometryMeasurer::new(MonospaceOracle);
        let snapshot = TextSnapshot::capture("abc");

        measurer.measure(&metrics(), &snapshot, 0, 1);
        measurer.invalidate();
        assert!(measurer.mirror().is_none());

        assert!(measurer.measure(&metrics(), &snapshot, 0, 1).is_some());
        assert_eq!(measurer.stats().mirrors_created, 2);
        assert_eq!(measurer.stats().content_resets, 2);
    }

    #[test]
    fn test_mirror_origin_never_leaks() {
        let snapshot = TextSnapshot::capture("abc");
        let mut offscreen = GeometryMeasurer::new(MonospaceOracle);
        let mut at_zero = GeometryMeasurer::with_mirror_origin(MonospaceOracle, LayoutPos::default());

        assert_eq!(
            offscreen.measure(&metrics(), &snapshot, 1, 3),
            at_zero.measure(&metrics(), &snapshot, 1, 3)
        );
    }
}
