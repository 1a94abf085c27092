//! Virtualized overlay rendering
//!
//! Only matches whose top edge falls inside the visible window get an
//! overlay. Overlays are keyed by what they show and where, so a scroll
//! frame reuses every overlay that stays in view and only touches the ones
//! entering or leaving. Leaving overlays are hidden, never destroyed;
//! destruction happens on [`VirtualScrollCompositor::clear`].

use crate::coordinates::{LayoutPos, Position, ViewPos, VisibleWindow};
use crate::pattern::{ColorKey, Match};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Handle to an overlay owned by an [`OverlaySink`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

/// Host side of overlay rendering (DOM nodes, GPU quads, terminal cells...)
pub trait OverlaySink {
    fn create(&mut self, position: &Position, text: &str, color: &ColorKey) -> OverlayId;
    /// Translate the overlay; `offset` is the negated scroll offset
    fn set_transform(&mut self, id: OverlayId, offset: ViewPos);
    fn set_visible(&mut self, id: OverlayId, visible: bool);
    fn destroy(&mut self, id: OverlayId);
}

/// A match together with where it landed
#[derive(Clone, Debug, PartialEq)]
pub struct PositionedMatch {
    pub matched: Match,
    pub position: Arc<Position>,
}

/// Identity of an overlay across frames
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct OverlayKey {
    top: u32,
    left: u32,
    text: Arc<str>,
    color: ColorKey,
}

/// `-0.0` and `0.0` are the same coordinate
fn key_bits(value: f32) -> u32 {
    (value + 0.0).to_bits()
}

impl OverlayKey {
    fn of(positioned: &PositionedMatch) -> Self {
        Self {
            top: key_bits(positioned.position.top),
            left: key_bits(positioned.position.left),
            text: positioned.matched.text.clone(),
            color: positioned.matched.color.clone(),
        }
    }
}

/// An overlay the compositor owns
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedHighlight {
    pub id: OverlayId,
    pub position: Position,
    pub text: Arc<str>,
    pub color: ColorKey,
    pub offset: ViewPos,
    pub visible: bool,
}

/// What one frame did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub created: usize,
    pub reused: usize,
    pub hidden: usize,
    /// Hidden overlays destroyed by [`VirtualScrollCompositor::prune_hidden`]
    pub pruned: usize,
}

pub struct VirtualScrollCompositor<S> {
    sink: S,
    rendered: AHashMap<OverlayKey, RenderedHighlight>,
    last_frame: FrameStats,
}

impl<S: OverlaySink> VirtualScrollCompositor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            rendered: AHashMap::new(),
            last_frame: FrameStats::default(),
        }
    }

    /// Bring the overlay set in line with `window`
    ///
    /// Returns the visible overlays in match order.
    pub fn update_virtual_view(
        &mut self,
        positioned: &[PositionedMatch],
        window: VisibleWindow,
        scroll: LayoutPos,
    ) -> Vec<RenderedHighlight> {
        let offset = ViewPos {
            x: -scroll.x,
            y: -scroll.y,
        };
        let mut stats = FrameStats::default();
        let mut touched = AHashSet::new();
        let mut visible = Vec::new();

        for pm in positioned {
            if !window.contains(pm.position.top) {
                continue;
            }
            let key = OverlayKey::of(pm);
            if touched.contains(&key) {
                continue;
            }

            let sink = &mut self.sink;
            let highlight = match self.rendered.get_mut(&key) {
                Some(existing) => {
                    sink.set_transform(existing.id, offset);
                    if !existing.visible {
                        sink.set_visible(existing.id, true);
                    }
                    existing.offset = offset;
                    existing.visible = true;
                    stats.reused += 1;
                    existing.clone()
                }
                None => {
                    let id = sink.create(&pm.position, &pm.matched.text, &pm.matched.color);
                    sink.set_transform(id, offset);
                    sink.set_visible(id, true);
                    let highlight = RenderedHighlight {
                        id,
                        position: *pm.position,
                        text: pm.matched.text.clone(),
                        color: pm.matched.color.clone(),
                        offset,
                        visible: true,
                    };
                    self.rendered.insert(key.clone(), highlight.clone());
                    stats.created += 1;
                    highlight
                }
            };
            visible.push(highlight);
            touched.insert(key);
        }

        for (key, highlight) in self.rendered.iter_mut() {
            if highlight.visible && !touched.contains(key) {
                self.sink.set_visible(highlight.id, false);
                highlight.visible = false;
                stats.hidden += 1;
            }
        }

        self.last_frame = stats;
        visible
    }

    /// Destroy every overlay, visible or hidden
    pub fn clear(&mut self) {
        for (_, highlight) in self.rendered.drain() {
            self.sink.destroy(highlight.id);
        }
    }

    /// Destroy every overlay that is currently hidden
    ///
    /// Used once positions are no longer comparable across frames (a new
    /// snapshot), so stale overlays can't pile up.
    pub fn prune_hidden(&mut self) -> usize {
        let sink = &mut self.sink;
        let before = self.rendered.len();
        self.rendered.retain(|_, highlight| {
            if highlight.visible {
                return true;
            }
            sink.destroy(highlight.id);
            false
        });
        let pruned = before - self.rendered.len();
        self.last_frame.pruned += pruned;
        pruned
    }

    /// Overlays currently shown
    pub fn visible_count(&self) -> usize {
        self.rendered.values().filter(|h| h.visible).count()
    }

    /// Overlays alive, shown or hidden
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// === Retained in-memory sink ===

/// State of one overlay as the sink last saw it
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayNode {
    pub position: Position,
    pub text: Arc<str>,
    pub color: ColorKey,
    pub offset: ViewPos,
    pub visible: bool,
}

impl OverlayNode {
    /// Where the overlay is drawn, in view space
    pub fn screen_pos(&self) -> ViewPos {
        ViewPos {
            x: self.position.left + self.offset.x,
            y: self.position.top + self.offset.y,
        }
    }
}

type WriteHook = Box<dyn FnMut() + Send>;

/// Sink that keeps every overlay in memory
///
/// The optional write hook fires after every write, the way a host's
/// mutation observer would fire when overlay nodes change.
#[derive(Default)]
pub struct RetainedOverlays {
    nodes: AHashMap<OverlayId, OverlayNode>,
    next_id: u64,
    created: u64,
    destroyed: u64,
    on_write: Option<WriteHook>,
}

impl RetainedOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_hook(hook: impl FnMut() + Send + 'static) -> Self {
        Self {
            on_write: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayNode> {
        self.nodes.get(&id)
    }

    pub fn visible(&self) -> impl Iterator<Item = (&OverlayId, &OverlayNode)> {
        self.nodes.iter().filter(|(_, node)| node.visible)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total overlays ever created
    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    fn wrote(&mut self) {
        if let Some(hook) = self.on_write.as_mut() {
            hook();
        }
    }
}

impl OverlaySink for RetainedOverlays {
    fn create(&mut self, position: &Position, text: &str, color: &ColorKey) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.nodes.insert(
            id,
            OverlayNode {
                position: *position,
                text: Arc::from(text),
                color: color.clone(),
                offset: ViewPos::default(),
                visible: false,
            },
        );
        self.wrote();
        id
    }

    fn set_transform(&mut self, id: OverlayId, offset: ViewPos) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.offset = offset;
        }
        self.wrote();
    }

    fn set_visible(&mut self, id: OverlayId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
        self.wrote();
    }

    fn destroy(&mut self, id: OverlayId) {
        if self.nodes.remove(&id).is_some() {
            self.destroyed += 1;
        }
        self.wrote();
    }
}

impl<T: OverlaySink + ?Sized> OverlaySink for Box<T> {
    fn create(&mut self, position: &Position, text: &str, color: &ColorKey) -> OverlayId {
        (**self).create(position, text, color)
    }

    fn set_transform(&mut self, id: OverlayId, offset: ViewPos) {
        (**self).set_transform(id, offset)
    }

    fn set_visible(&mut self, id: OverlayId, visible: bool) {
        (**self).set_visible(id, visible)
    }

    fn destroy(&mut self, id: OverlayId) {
        (**self).destroy(id)
    }
}
