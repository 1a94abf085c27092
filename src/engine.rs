//! The highlight pipeline: text + patterns + viewport -> visible overlays
//!
//! One [`HighlightEngine`] owns the matcher, measurer, cache, compositor
//! and scheduler for one text source. Hosts deliver change notifications
//! (directly or through a [`ChangeNotifier`]) and call
//! [`HighlightEngine::on_animation_frame`] from their frame callback.

use crate::compositor::{OverlaySink, PositionedMatch, RenderedHighlight, VirtualScrollCompositor};
use crate::config::EngineConfig;
use crate::coordinates::Viewport;
use crate::font::TypesettingOracle;
use crate::measure::{GeometryMeasurer, MeasureStats};
use crate::notifier::{ChangeKind, ChangeNotifier, SubscriptionId};
use crate::pattern::{ColorMap, CompiledPatterns, Match, PatternSpec};
use crate::position_cache::{CacheStats, PositionCache};
use crate::scheduler::{ChangeScheduler, SchedulerStats, Trigger};
use crate::snapshot::TextSnapshot;
use std::sync::Arc;
use std::time::Instant;

/// The live text buffer being highlighted
pub trait TextSource {
    /// Current content
    fn text(&self) -> Arc<str>;
    /// Current scroll offset, size and text-affecting metrics
    fn viewport(&self) -> Viewport;
}

impl<T: TextSource + ?Sized> TextSource for Box<T> {
    fn text(&self) -> Arc<str> {
        (**self).text()
    }

    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }
}

impl<T: TextSource + ?Sized> TextSource for Arc<T> {
    fn text(&self) -> Arc<str> {
        (**self).text()
    }

    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }
}

fn trigger_for(kind: ChangeKind) -> Trigger {
    match kind {
        ChangeKind::Text => Trigger::TextChanged,
        ChangeKind::Scroll => Trigger::Scrolled,
        ChangeKind::Resize => Trigger::Resized,
        ChangeKind::Fonts => Trigger::FontsReady,
    }
}

struct Attachment {
    notifier: Arc<dyn ChangeNotifier>,
    subscriptions: Vec<SubscriptionId>,
}

impl Attachment {
    fn detach(self) {
        for id in self.subscriptions {
            self.notifier.unsubscribe(id);
        }
    }
}

pub struct HighlightEngine<S, O, K> {
    config: EngineConfig,
    source: S,
    patterns: CompiledPatterns,
    measurer: GeometryMeasurer<O>,
    cache: PositionCache,
    compositor: VirtualScrollCompositor<K>,
    scheduler: ChangeScheduler,
    snapshot: Option<TextSnapshot>,
    matches: Vec<Match>,
    positioned: Vec<PositionedMatch>,
    rendered: Vec<RenderedHighlight>,
    /// Positions were dropped outside a frame; the next frame re-measures
    positions_dropped: bool,
    attachment: Option<Attachment>,
}

impl<S, O, K> HighlightEngine<S, O, K>
where
    S: TextSource,
    O: TypesettingOracle,
    K: OverlaySink,
{
    /// Build an engine with an empty pattern set; the first frame captures
    /// the initial snapshot
    pub fn new(config: EngineConfig, source: S, oracle: O, sink: K) -> Self {
        let scheduler = ChangeScheduler::new(config.poll_interval());
        scheduler.notify(Trigger::TextChanged);

        Self {
            measurer: GeometryMeasurer::with_mirror_origin(oracle, config.mirror_origin()),
            cache: PositionCache::with_threshold(config.cache_threshold),
            compositor: VirtualScrollCompositor::new(sink),
            patterns: CompiledPatterns::default(),
            snapshot: None,
            matches: Vec::new(),
            positioned: Vec::new(),
            rendered: Vec::new(),
            positions_dropped: false,
            attachment: None,
            scheduler,
            source,
            config,
        }
    }

    /// Subscribe to text, scroll, resize and font notifications
    ///
    /// Replaces any previous attachment.
    pub fn attach(&mut self, notifier: Arc<dyn ChangeNotifier>) {
        self.detach();

        let subscriptions = [ChangeKind::Text, ChangeKind::Scroll, ChangeKind::Resize, ChangeKind::Fonts]
            .into_iter()
            .map(|kind| {
                let handle = self.scheduler.handle();
                notifier.subscribe(
                    kind,
                    Box::new(move |kind| {
                        handle.notify(trigger_for(kind));
                    }),
                )
            })
            .collect();

        self.attachment = Some(Attachment {
            notifier,
            subscriptions,
        });
    }

    /// Drop notifier subscriptions, if any
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.detach();
        }
    }

    /// Replace the active pattern set and schedule a full recompute
    pub fn set_patterns(&mut self, patterns: &[PatternSpec], colors: &ColorMap) {
        self.patterns = CompiledPatterns::new(patterns, colors);
        if self.patterns.disabled_count() > 0 {
            tracing::info!(
                total = self.patterns.len(),
                disabled = self.patterns.disabled_count(),
                "pattern set updated with disabled patterns"
            );
        }
        self.scheduler.notify(Trigger::Forced);
    }

    pub fn force_update(&mut self) {
        self.scheduler.notify(Trigger::Forced);
    }

    /// Drop cached positions and destroy every overlay right away
    ///
    /// Matches are kept; the next frame, whatever triggered it, measures
    /// them again.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.compositor.clear();
        self.positioned.clear();
        self.rendered.clear();
        self.positions_dropped = true;
    }

    /// Record an external trigger
    pub fn notify(&self, trigger: Trigger) -> bool {
        self.scheduler.notify(trigger)
    }

    /// Whether the host should schedule an animation frame
    pub fn frame_requested(&self) -> bool {
        self.scheduler.frame_requested()
    }

    /// Run pending work, if any; returns whether a frame ran
    pub fn on_animation_frame(&mut self) -> bool {
        let Some(frame) = self.scheduler.begin_frame() else {
            return false;
        };
        let work = frame.work();

        if work.reset {
            self.cache.clear();
            self.compositor.clear();
            self.measurer.invalidate();
        } else if work.remeasure {
            self.measurer.invalidate();
            self.cache.clear();
        }

        // Always the latest text; intermediate states are never applied
        let mut rematched = false;
        let mut new_snapshot = false;
        if work.rematch || work.reset || self.snapshot.is_none() {
            let text = self.source.text();
            let stale = self
                .snapshot
                .as_ref()
                .map_or(true, |snapshot| !snapshot.matches_text(&text));
            if stale {
                self.snapshot = Some(TextSnapshot::capture(text));
                self.cache.clear();
                new_snapshot = true;
            }
            if let Some(snapshot) = &self.snapshot {
                self.matches = self.patterns.find_matches(snapshot.text());
            }
            rematched = true;
        }

        let viewport = self.source.viewport();
        if rematched || work.remeasure || self.positions_dropped {
            self.measure_all(&viewport);
            self.positions_dropped = false;
        }

        let window = viewport.visible_window(self.config.buffer_margin);
        self.rendered = self
            .compositor
            .update_virtual_view(&self.positioned, window, viewport.scroll);

        // Overlays hidden by a text change point at positions that no longer exist
        if new_snapshot || work.remeasure {
            self.compositor.prune_hidden();
        }

        let stats = self.compositor.last_frame();
        tracing::debug!(
            matches = self.matches.len(),
            positioned = self.positioned.len(),
            visible = self.rendered.len(),
            created = stats.created,
            reused = stats.reused,
            hidden = stats.hidden,
            pruned = stats.pruned,
            ?work,
            "frame"
        );

        drop(frame);
        true
    }

    fn measure_all(&mut self, viewport: &Viewport) {
        self.positioned.clear();
        let Some(snapshot) = &self.snapshot else {
            return;
        };

        for matched in &self.matches {
            let position = match self.cache.get(snapshot, matched.start, &matched.text) {
                Some(position) => position,
                None => {
                    let Some(position) =
                        self.measurer
                            .measure(&viewport.metrics, snapshot, matched.start, matched.end)
                    else {
                        continue;
                    };
                    self.cache.set(snapshot, matched.start, &matched.text, position)
                }
            };
            self.positioned.push(PositionedMatch {
                matched: matched.clone(),
                position,
            });
        }
    }

    /// Polling fallback; enqueues `TextChanged` when the text drifted from
    /// the live snapshot. Returns whether it did.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.scheduler.poll_due(now) {
            return false;
        }
        let text = self.source.text();
        let changed = self
            .snapshot
            .as_ref()
            .map_or(true, |snapshot| !snapshot.matches_text(&text));
        changed && self.scheduler.notify(Trigger::TextChanged)
    }

    /// Unsubscribe and destroy every overlay
    pub fn dispose(&mut self) {
        self.detach();
        self.clear_cache();
    }

    /// Overlays shown by the last frame, in match order
    pub fn rendered(&self) -> &[RenderedHighlight] {
        &self.rendered
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn positioned(&self) -> &[PositionedMatch] {
        &self.positioned
    }

    pub fn snapshot(&self) -> Option<&TextSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn patterns(&self) -> &CompiledPatterns {
        &self.patterns
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn compositor(&self) -> &VirtualScrollCompositor<K> {
        &self.compositor
    }

    pub fn sink(&self) -> &K {
        self.compositor.sink()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn measure_stats(&self) -> MeasureStats {
        self.measurer.stats()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}

impl<S, O, K> Drop for HighlightEngine<S, O, K> {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::RetainedOverlays;
    use crate::coordinates::{LayoutPos, StyleMetrics};
    use crate::font::MonospaceOracle;
    use crate::notifier::NotifierHub;
    use parking_lot::Mutex;

    #[derive(Clone)]
    struct Buffer(Arc<Mutex<(Arc<str>, Viewport)>>);

    impl Buffer {
        fn new(text: &str) -> Self {
            let mut metrics = StyleMetrics::new(10.0).with_width(200.0);
            metrics.char_width = 10.0;
            metrics.line_height = 20.0;
            let viewport = Viewport::new(200.0, 100.0).with_metrics(metrics);
            Self(Arc::new(Mutex::new((Arc::from(text), viewport))))
        }

        fn set_text(&self, text: &str) {
            self.0.lock().0 = Arc::from(text);
        }

        fn scroll_to(&self, y: f32) {
            self.0.lock().1.scroll = LayoutPos::new(0.0, y);
        }
    }

    impl TextSource for Buffer {
        fn text(&self) -> Arc<str> {
            self.0.lock().0.clone()
        }

        fn viewport(&self) -> Viewport {
            self.0.lock().1.clone()
        }
    }

    type TestEngine = HighlightEngine<Buffer, MonospaceOracle, RetainedOverlays>;

    fn engine(buffer: &Buffer, config: EngineConfig) -> TestEngine {
        let mut engine = HighlightEngine::new(config, buffer.clone(), MonospaceOracle, RetainedOverlays::new());
        engine.set_patterns(&[PatternSpec::literal("2330")], &ColorMap::new("red"));
        engine
    }

    #[test]
    fn test_first_frame_renders_matches() {
        let buffer = Buffer::new("abc (2330-TW) def");
        let mut engine = engine(&buffer, EngineConfig::default());

        assert!(engine.frame_requested());
        assert!(engine.on_animation_frame());
        assert!(!engine.on_animation_frame());

        assert_eq!(engine.matches().len(), 1);
        assert_eq!(engine.matches()[0].start, 5);
        assert_eq!(engine.rendered().len(), 1);
        assert_eq!(engine.rendered()[0].position.left, 50.0);
        assert_eq!(engine.sink().created(), 1);
    }

    #[test]
    fn test_scroll_reuses_positions() {
        let buffer = Buffer::new("2330\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n2330");
        let config = EngineConfig {
            buffer_margin: 0.0,
            ..EngineConfig::default()
        };
        let mut engine = engine(&buffer, config);
        engine.on_animation_frame();
        assert_eq!(engine.positioned().len(), 2);
        assert_eq!(engine.rendered().len(), 1);
        let measured = engine.measure_stats().measurements;

        buffer.scroll_to(350.0);
        engine.notify(Trigger::Scrolled);
        engine.on_animation_frame();

        assert_eq!(engine.rendered().len(), 1);
        assert_eq!(engine.rendered()[0].position.top, 400.0);
        assert_eq!(engine.measure_stats().measurements, measured);
        assert_eq!(engine.compositor().len(), 2);
        assert_eq!(engine.compositor().visible_count(), 1);
    }

    #[test]
    fn test_text_change_recaptures_snapshot() {
        let buffer = Buffer::new("2330");
        let mut engine = engine(&buffer, EngineConfig::default());
        engine.on_animation_frame();
        let first = engine.snapshot().map(|s| s.id());

        // Same text: snapshot kept
        engine.notify(Trigger::TextChanged);
        engine.on_animation_frame();
        assert_eq!(engine.snapshot().map(|s| s.id()), first);

        buffer.set_text("x 2330 2330");
        engine.notify(Trigger::TextChanged);
        engine.on_animation_frame();
        assert_ne!(engine.snapshot().map(|s| s.id()), first);
        assert_eq!(engine.rendered().len(), 2);
    }

    #[test]
    fn test_clear_cache_destroys_overlays() {
        let buffer = Buffer::new("2330 2330");
        let mut engine = engine(&buffer, EngineConfig::default());
        engine.on_animation_frame();
        assert_eq!(engine.sink().len(), 2);

        engine.clear_cache();
        assert_eq!(engine.sink().len(), 0);
        assert_eq!(engine.sink().destroyed(), 2);
        assert_eq!(engine.cache_len(), 0);
        assert!(engine.rendered().is_empty());
    }

    #[test]
    fn test_attach_and_dispose() {
        let hub = Arc::new(NotifierHub::new());
        let buffer = Buffer::new("2330");
        let mut engine = engine(&buffer, EngineConfig::default());
        engine.on_animation_frame();

        engine.attach(hub.clone());
        assert_eq!(hub.subscriber_count(), 4);

        hub.emit(ChangeKind::Scroll);
        assert!(engine.frame_requested());
        engine.on_animation_frame();

        engine.dispose();
        assert_eq!(hub.subscriber_count(), 0);
        hub.emit(ChangeKind::Text);
        assert!(!engine.frame_requested());
        assert!(engine.sink().is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Arc::new(NotifierHub::new());
        let buffer = Buffer::new("2330");
        {
            let mut engine = engine(&buffer, EngineConfig::default());
            engine.attach(hub.clone());
            assert_eq!(hub.subscriber_count(), 4);
        }
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_poll_detects_drift() {
        let start = Instant::now();
        let buffer = Buffer::new("2330");
        let mut engine = engine(&buffer, EngineConfig::default());
        engine.on_animation_frame();

        assert!(!engine.poll(start));
        buffer.set_text("2330 2330");
        assert!(!engine.poll(start + std::time::Duration::from_millis(100)));
        assert!(engine.poll(start + std::time::Duration::from_millis(600)));

        engine.on_animation_frame();
        assert_eq!(engine.rendered().len(), 2);
    }
}
