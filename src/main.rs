//! tiny-highlight: print the overlays a viewport would show for a file

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_highlight::{
    logging, HighlightConfig, HighlightEngine, LayoutPos, MonospaceOracle, RetainedOverlays, TextSource, Viewport,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "tiny-highlight", version, about)]
struct Args {
    /// Text file to highlight
    file: PathBuf,

    /// Settings file with `[[pattern]]` entries
    #[arg(short, long, env = "TINY_HIGHLIGHT_CONFIG", default_value = "tiny-highlight.toml")]
    config: PathBuf,

    /// Vertical scroll offset in pixels
    #[arg(short, long, default_value_t = 0.0)]
    scroll: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Viewport width in pixels; defaults to the configured style width
    #[arg(long)]
    width: Option<f32>,
}

/// A file loaded once, viewed through a fixed viewport
struct StaticText {
    text: Arc<str>,
    viewport: Viewport,
}

impl TextSource for StaticText {
    fn text(&self) -> Arc<str> {
        self.text.clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport.clone()
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Err(err) = logging::init() {
        eprintln!("logging disabled: {err}");
    }

    let config = HighlightConfig::load(&args.config)?;
    let (patterns, colors) = config.pattern_set()?;
    if patterns.is_empty() {
        tracing::warn!(config = %args.config.display(), "no patterns configured");
    }

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let width = args.width.unwrap_or(config.style.width);
    let mut viewport = Viewport::new(width, args.height).with_metrics(config.style.clone());
    viewport.resize(width, args.height);
    viewport.scroll = LayoutPos::new(0.0, args.scroll);

    let source = StaticText {
        text: Arc::from(text),
        viewport,
    };
    let mut engine = HighlightEngine::new(config.engine.clone(), source, MonospaceOracle, RetainedOverlays::new());
    engine.set_patterns(&patterns, &colors);
    engine.on_animation_frame();

    for highlight in engine.rendered() {
        let p = highlight.position;
        println!(
            "{:>8.1} {:>8.1} {:>6.1}x{:<5.1} {:<10} {}",
            p.top,
            p.left,
            p.width,
            p.height,
            highlight.color,
            highlight.text.escape_debug()
        );
    }

    tracing::info!(
        matches = engine.matches().len(),
        positioned = engine.positioned().len(),
        visible = engine.rendered().len(),
        "done"
    );
    Ok(())
}
