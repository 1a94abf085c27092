//! Coordinate system transformation hub
//!
//! Three coordinate spaces with explicit transformations:
//! 1. Document space: byte offsets into a text snapshot (what patterns match)
//! 2. Layout space: logical pixels, pre-scroll, content-local (where matches live)
//! 3. View space: logical pixels, post-scroll (what's visible)

use serde::{Deserialize, Serialize};

// === Layout Space (pre-scroll) ===

/// Position in layout space - where things are before scrolling
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutPos {
    pub x: f32,
    pub y: f32,
}

impl LayoutPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size in layout space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutSize {
    pub width: f32,
    pub height: f32,
}

/// Rectangle in layout space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &LayoutRect) -> LayoutRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        LayoutRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> LayoutRect {
        LayoutRect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

// === View Space (post-scroll) ===

/// Position in view space - layout minus scroll offset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewPos {
    pub x: f32,
    pub y: f32,
}

// === Match geometry ===

/// Pixel rectangle a match occupies, content-local (scroll excluded)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl From<LayoutRect> for Position {
    fn from(rect: LayoutRect) -> Self {
        Self {
            top: rect.y,
            left: rect.x,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Vertical band of layout space considered "currently rendered"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleWindow {
    pub top: f32,
    pub bottom: f32,
}

impl VisibleWindow {
    /// Scroll range padded by `margin` on both sides
    pub fn around(scroll_y: f32, viewport_height: f32, margin: f32) -> Self {
        Self {
            top: scroll_y - margin,
            bottom: scroll_y + viewport_height + margin,
        }
    }

    /// Inclusive on both ends
    pub fn contains(&self, y: f32) -> bool {
        self.top <= y && y <= self.bottom
    }
}

// === Style Metrics (single source of truth for text layout) ===

/// Box edge widths (padding or border)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Edges {
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub right: f32,
    #[serde(default)]
    pub bottom: f32,
    #[serde(default)]
    pub left: f32,
}

impl Edges {
    pub const fn uniform(width: f32) -> Self {
        Self {
            top: width,
            right: width,
            bottom: width,
            left: width,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

/// How whitespace and line breaking behave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhiteSpace {
    /// Preserve whitespace, never soft wrap
    Pre,
    /// Preserve whitespace, soft wrap at the content width (textarea default)
    #[default]
    PreWrap,
}

/// Every style property that affects where characters land
///
/// Two viewports with equal metrics lay out identical text identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleMetrics {
    /// Font size in logical pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Line height in logical pixels
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    /// Advance of one column in logical pixels
    #[serde(default = "default_char_width")]
    pub char_width: f32,
    /// Number of columns per tab
    #[serde(default = "default_tab_stops")]
    pub tab_stops: u32,
    #[serde(default)]
    pub padding: Edges,
    #[serde(default)]
    pub border: Edges,
    /// Outer width of the viewport element (border box)
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default)]
    pub white_space: WhiteSpace,
}

fn default_font_size() -> f32 { 14.0 }
fn default_line_height() -> f32 { default_font_size() * 1.4 }
fn default_char_width() -> f32 { default_font_size() * 0.6 }
fn default_tab_stops() -> u32 { 8 }
fn default_width() -> f32 { 800.0 }

impl StyleMetrics {
    pub fn new(font_size: f32) -> Self {
        Self {
            font_size,
            line_height: font_size * 1.4, // Standard line height multiplier
            char_width: font_size * 0.6,  // Approximate for monospace
            tab_stops: 8,
            padding: Edges::default(),
            border: Edges::default(),
            width: default_width(),
            white_space: WhiteSpace::PreWrap,
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Width available to text after padding and border
    pub fn content_width(&self) -> f32 {
        (self.width - self.padding.horizontal() - self.border.horizontal()).max(0.0)
    }

    /// Fixed offset from the border box origin to the first character
    pub fn content_offset(&self) -> LayoutPos {
        LayoutPos {
            x: self.padding.left + self.border.left,
            y: self.padding.top + self.border.top,
        }
    }

    /// Columns that fit on one visual line (at least one)
    pub fn columns_per_line(&self) -> u32 {
        if self.char_width <= 0.0 {
            return u32::MAX;
        }
        ((self.content_width() / self.char_width).floor() as u32).max(1)
    }

    /// Column reached after a tab starting at `column`
    pub fn next_tab_stop(&self, column: u32) -> u32 {
        let stops = self.tab_stops.max(1);
        ((column / stops) + 1) * stops
    }
}

impl Default for StyleMetrics {
    fn default() -> Self {
        Self::new(default_font_size())
    }
}

// === THE Viewport ===

/// Scroll state, size and metrics of the live text viewport
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Current scroll position in layout space
    pub scroll: LayoutPos,
    /// Visible size of the viewport
    pub logical_size: LayoutSize,
    pub metrics: StyleMetrics,
}

impl Viewport {
    pub fn new(logical_width: f32, logical_height: f32) -> Self {
        Self {
            scroll: LayoutPos::default(),
            logical_size: LayoutSize {
                width: logical_width,
                height: logical_height,
            },
            metrics: StyleMetrics::default().with_width(logical_width),
        }
    }

    pub fn with_metrics(mut self, metrics: StyleMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Update viewport on resize; the metrics width follows the new width
    pub fn resize(&mut self, logical_width: f32, logical_height: f32) {
        self.logical_size = LayoutSize {
            width: logical_width,
            height: logical_height,
        };
        self.metrics.width = logical_width;
    }

    /// Visible band padded by `margin` above and below
    pub fn visible_window(&self, margin: f32) -> VisibleWindow {
        VisibleWindow::around(self.scroll.y, self.logical_size.height, margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_window_margin() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.scroll.y = 1000.0;

        let window = viewport.visible_window(200.0);
        assert_eq!(window.top, 800.0);
        assert_eq!(window.bottom, 1800.0);
        assert!(window.contains(800.0));
        assert!(window.contains(1800.0));
        assert!(!window.contains(799.9));
    }

    #[test]
    fn test_content_box() {
        let mut metrics = StyleMetrics::new(10.0).with_width(120.0);
        metrics.padding = Edges::uniform(8.0);
        metrics.border = Edges::uniform(2.0);

        assert_eq!(metrics.content_width(), 100.0);
        assert_eq!(metrics.content_offset(), LayoutPos::new(10.0, 10.0));
        assert_eq!(metrics.columns_per_line(), 16); // 100 / 6
    }

    #[test]
    fn test_tab_stops() {
        let mut metrics = StyleMetrics::new(14.0);
        metrics.tab_stops = 4;

        assert_eq!(metrics.next_tab_stop(0), 4);
        assert_eq!(metrics.next_tab_stop(3), 4);
        assert_eq!(metrics.next_tab_stop(4), 8);
    }

    #[test]
    fn test_rect_union() {
        let a = LayoutRect::new(10.0, 0.0, 20.0, 10.0);
        let b = LayoutRect::new(0.0, 10.0, 5.0, 10.0);
        assert_eq!(a.union(&b), LayoutRect::new(0.0, 0.0, 30.0, 20.0));
    }
}
