//! Shared fixtures for integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use tiny_highlight::{
    ColorMap, EngineConfig, HighlightEngine, LayoutPos, MonospaceOracle, PatternSpec, RetainedOverlays, StyleMetrics,
    TextSource, Viewport,
};

pub const CHAR_WIDTH: f32 = 10.0;
pub const LINE_HEIGHT: f32 = 20.0;

pub type TestEngine = HighlightEngine<SharedBuffer, MonospaceOracle, RetainedOverlays>;

struct BufferState {
    text: Arc<str>,
    viewport: Viewport,
}

/// Editable, scrollable buffer shared between a test and its engine
#[derive(Clone)]
pub struct SharedBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl SharedBuffer {
    pub fn new(text: &str, width: f32, height: f32) -> Self {
        let mut metrics = StyleMetrics::new(16.0).with_width(width);
        metrics.char_width = CHAR_WIDTH;
        metrics.line_height = LINE_HEIGHT;

        Self {
            state: Arc::new(Mutex::new(BufferState {
                text: Arc::from(text),
                viewport: Viewport::new(width, height).with_metrics(metrics),
            })),
        }
    }

    pub fn set_text(&self, text: &str) {
        self.state.lock().text = Arc::from(text);
    }

    pub fn insert(&self, at: usize, insert: &str) {
        let mut state = self.state.lock();
        let mut text = state.text.to_string();
        text.insert_str(at, insert);
        state.text = Arc::from(text);
    }

    pub fn scroll_to(&self, y: f32) {
        self.state.lock().viewport.scroll = LayoutPos::new(0.0, y);
    }

    pub fn resize(&self, width: f32, height: f32) {
        self.state.lock().viewport.resize(width, height);
    }

    /// Simulates a web font replacing the fallback face
    pub fn set_char_width(&self, char_width: f32) {
        self.state.lock().viewport.metrics.char_width = char_width;
    }
}

impl TextSource for SharedBuffer {
    fn text(&self) -> Arc<str> {
        self.state.lock().text.clone()
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport.clone()
    }
}

pub fn engine_with(buffer: &SharedBuffer, config: EngineConfig, sink: RetainedOverlays) -> TestEngine {
    HighlightEngine::new(config, buffer.clone(), MonospaceOracle, sink)
}

/// Engine highlighting `patterns` in red, first frame already run
pub fn ready_engine(buffer: &SharedBuffer, patterns: &[PatternSpec]) -> TestEngine {
    let mut engine = engine_with(buffer, EngineConfig::default(), RetainedOverlays::new());
    engine.set_patterns(patterns, &ColorMap::new("red"));
    assert!(engine.on_animation_frame());
    engine
}

/// `lines` short lines, every `every`-th one containing `needle`
pub fn scattered(lines: usize, every: usize, needle: &str) -> String {
    let mut text = String::new();
    for line in 0..lines {
        if line % every == 0 {
            text.push_str(&format!("row {line} {needle}\n"));
        } else {
            text.push_str(&format!("row {line} plain\n"));
        }
    }
    text
}
