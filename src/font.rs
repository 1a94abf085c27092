//! Typesetting oracle - the text shaping backend behind measurement
//!
//! An oracle turns a string plus [`StyleMetrics`] into positioned glyphs.
//! Everything else asks the shaped text where a byte range landed.

use crate::coordinates::{LayoutRect, StyleMetrics, WhiteSpace};
use std::ops::Range;
use unicode_width::UnicodeWidthChar;

/// A character placed by the oracle, content-box relative
#[derive(Clone, Debug, PartialEq)]
pub struct PositionedGlyph {
    /// Character for debugging
    pub char: char,
    /// Bytes of the source text this glyph covers
    pub byte_range: Range<usize>,
    pub rect: LayoutRect,
    /// Visual line (after soft wrapping)
    pub line: u32,
}

impl PositionedGlyph {
    fn is_line_break(&self) -> bool {
        self.char == '\n'
    }
}

/// Visual line metadata
#[derive(Clone, Debug, PartialEq)]
pub struct LineInfo {
    pub line_number: u32,
    pub byte_range: Range<usize>,
    pub y_position: f32,
    pub height: f32,
}

/// Output of [`TypesettingOracle::shape`]
#[derive(Clone, Debug, Default)]
pub struct ShapedText {
    /// Sorted by byte offset
    pub glyphs: Vec<PositionedGlyph>,
    pub lines: Vec<LineInfo>,
    pub width: f32,
    pub height: f32,
}

impl ShapedText {
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Bounding rectangle of the glyphs covering `[start, end)`
    ///
    /// `None` when the range is empty, runs past the text, splits a
    /// character, or covers nothing but line breaks.
    pub fn range_rect(&self, start: usize, end: usize) -> Option<LayoutRect> {
        if start >= end {
            return None;
        }

        let first = self.glyphs.partition_point(|g| g.byte_range.start < start);
        let first_glyph = self.glyphs.get(first)?;
        if first_glyph.byte_range.start != start {
            return None;
        }

        let mut bounds: Option<LayoutRect> = None;
        let mut covered_to = start;
        for glyph in &self.glyphs[first..] {
            if glyph.byte_range.start >= end {
                break;
            }
            covered_to = glyph.byte_range.end;
            if glyph.is_line_break() {
                continue;
            }
            bounds = Some(match bounds {
                Some(rect) => rect.union(&glyph.rect),
                None => glyph.rect,
            });
        }

        if covered_to != end {
            return None;
        }
        bounds
    }
}

/// Text shaping backend
///
/// Implementations must be pure: equal text and metrics give equal output.
pub trait TypesettingOracle {
    fn shape(&self, text: &str, metrics: &StyleMetrics) -> ShapedText;

    /// One-shot measurement of `[start, end)`
    fn measure_range(
        &self,
        text: &str,
        start: usize,
        end: usize,
        metrics: &StyleMetrics,
    ) -> Option<LayoutRect> {
        self.shape(text, metrics).range_rect(start, end)
    }
}

impl<T: TypesettingOracle + ?Sized> TypesettingOracle for Box<T> {
    fn shape(&self, text: &str, metrics: &StyleMetrics) -> ShapedText {
        (**self).shape(text, metrics)
    }
}

/// Fixed-advance layout: every column is `char_width` wide
///
/// Wide East Asian characters take two columns, zero-width marks take none.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonospaceOracle;

impl TypesettingOracle for MonospaceOracle {
    fn shape(&self, text: &str, metrics: &StyleMetrics) -> ShapedText {
        let mut layout = LineLayout::new(metrics);

        let mut line_start = 0;
        for hard_line in text.split_inclusive('\n') {
            let body = hard_line.strip_suffix('\n').unwrap_or(hard_line);
            layout.place_hard_line(body, line_start);

            if body.len() < hard_line.len() {
                layout.push_break(line_start + body.len());
            }
            line_start += hard_line.len();
        }

        layout.finish(text.len())
    }
}

/// Greedy line breaker shared by both whitespace modes
struct LineLayout<'m> {
    metrics: &'m StyleMetrics,
    max_columns: u32,
    glyphs: Vec<PositionedGlyph>,
    lines: Vec<LineInfo>,
    line: u32,
    column: u32,
    line_start: usize,
    widest: u32,
}

impl<'m> LineLayout<'m> {
    fn new(metrics: &'m StyleMetrics) -> Self {
        let max_columns = match metrics.white_space {
            WhiteSpace::Pre => u32::MAX,
            WhiteSpace::PreWrap => metrics.columns_per_line(),
        };
        Self {
            metrics,
            max_columns,
            glyphs: Vec::new(),
            lines: Vec::new(),
            line: 0,
            column: 0,
            line_start: 0,
            widest: 0,
        }
    }

    fn place_hard_line(&mut self, body: &str, offset: usize) {
        for (word_offset, word, is_space) in segments(body) {
            let word_start = offset + word_offset;
            if is_space {
                // Preserved spaces hang past the edge instead of wrapping
                for (i, ch) in word.char_indices() {
                    self.place(ch, word_start + i);
                }
                continue;
            }

            let columns: u32 = word.chars().map(char_columns).sum();
            if self.column > 0 && self.column.saturating_add(columns) > self.max_columns {
                self.soft_break(word_start);
            }
            for (i, ch) in word.char_indices() {
                let cols = char_columns(ch);
                // Words wider than a whole line break anywhere
                if self.column > 0 && self.column.saturating_add(cols) > self.max_columns {
                    self.soft_break(word_start + i);
                }
                self.place(ch, word_start + i);
            }
        }
    }

    fn place(&mut self, ch: char, byte: usize) {
        let columns = if ch == '\t' {
            self.metrics.next_tab_stop(self.column) - self.column
        } else {
            char_columns(ch)
        };
        self.glyphs.push(PositionedGlyph {
            char: ch,
            byte_range: byte..byte + ch.len_utf8(),
            rect: LayoutRect::new(
                self.column as f32 * self.metrics.char_width,
                self.line as f32 * self.metrics.line_height,
                columns as f32 * self.metrics.char_width,
                self.metrics.line_height,
            ),
            line: self.line,
        });
        self.column = self.column.saturating_add(columns);
    }

    /// Newline glyph: zero width, keeps byte positions contiguous
    fn push_break(&mut self, byte: usize) {
        self.glyphs.push(PositionedGlyph {
            char: '\n',
            byte_range: byte..byte + 1,
            rect: LayoutRect::new(
                self.column as f32 * self.metrics.char_width,
                self.line as f32 * self.metrics.line_height,
                0.0,
                self.metrics.line_height,
            ),
            line: self.line,
        });
        self.end_line(byte + 1);
    }

    fn soft_break(&mut self, byte: usize) {
        self.end_line(byte);
    }

    fn end_line(&mut self, next_start: usize) {
        self.lines.push(LineInfo {
            line_number: self.line,
            byte_range: self.line_start..next_start,
            y_position: self.line as f32 * self.metrics.line_height,
            height: self.metrics.line_height,
        });
        self.widest = self.widest.max(self.column);
        self.line += 1;
        self.column = 0;
        self.line_start = next_start;
    }

    fn finish(mut self, text_len: usize) -> ShapedText {
        self.end_line(text_len);
        ShapedText {
            width: self.widest as f32 * self.metrics.char_width,
            height: self.lines.len() as f32 * self.metrics.line_height,
            glyphs: self.glyphs,
            lines: self.lines,
        }
    }
}

fn char_columns(ch: char) -> u32 {
    if ch == '\t' {
        return 1;
    }
    ch.width().unwrap_or(0) as u32
}

/// Split a line into alternating runs of spaces and non-spaces
fn segments(line: &str) -> impl Iterator<Item = (usize, &str, bool)> {
    let mut rest = line;
    let mut offset = 0;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_space = is_break_space(first);
        let len = rest
            .char_indices()
            .find(|&(_, ch)| is_break_space(ch) != is_space)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (segment, tail) = rest.split_at(len);
        let item = (offset, segment, is_space);
        offset += len;
        rest = tail;
        Some(item)
    })
}

fn is_break_space(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}
