//! Text-match positioning and virtualized highlight overlays
//!
//! Patterns are matched against a snapshot of a live text buffer, each
//! match is measured on a mirror surface that wraps exactly like the
//! buffer's viewport, and only matches near the visible area get an
//! overlay. See [`HighlightEngine`] for the pipeline.

pub mod compositor;
pub mod config;
pub mod coordinates; // Coordinate system abstraction
pub mod engine;
pub mod font;
pub mod logging;
pub mod measure;
pub mod notifier;
pub mod pattern;
pub mod position_cache;
pub mod scheduler;
pub mod snapshot;

// Re-export core types
pub use compositor::{OverlayId, OverlaySink, PositionedMatch, RenderedHighlight, RetainedOverlays};
pub use compositor::VirtualScrollCompositor;
pub use config::{ConfigError, EngineConfig, HighlightConfig};
pub use coordinates::{LayoutPos, Position, StyleMetrics, Viewport, VisibleWindow, WhiteSpace};
pub use engine::{HighlightEngine, TextSource};
pub use font::{MonospaceOracle, ShapedText, TypesettingOracle};
pub use measure::GeometryMeasurer;
pub use notifier::{ChangeKind, ChangeNotifier, NotifierHub};
pub use pattern::{find_first, find_matches, ColorKey, ColorMap, CompiledPatterns, Match, PatternError, PatternSpec};
pub use position_cache::PositionCache;
pub use scheduler::{ChangeScheduler, Trigger};
pub use snapshot::{SnapshotId, TextSnapshot};
