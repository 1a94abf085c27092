//! Configuration for the highlight engine and the settings file format

use crate::coordinates::{LayoutPos, StyleMetrics};
use crate::pattern::{ColorMap, PatternSpec};
use crate::position_cache::DEFAULT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("pattern #{index}: {reason}")]
    InvalidPattern { index: usize, reason: &'static str },
}

/// Tunables of one engine instance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Pixels rendered above and below the visible area
    #[serde(default = "default_buffer_margin")]
    pub buffer_margin: f32,
    /// Position cache size that triggers eviction
    #[serde(default = "default_cache_threshold")]
    pub cache_threshold: usize,
    /// Text polling fallback interval; 0 disables polling
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Where the measuring mirror lives
    #[serde(default = "default_mirror_origin")]
    pub mirror_origin: [f32; 2],
}

fn default_buffer_margin() -> f32 { 200.0 }
fn default_cache_threshold() -> usize { DEFAULT_THRESHOLD }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_mirror_origin() -> [f32; 2] { [-9999.0, -9999.0] }
fn default_color() -> String { "yellow".to_string() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_margin: default_buffer_margin(),
            cache_threshold: default_cache_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            mirror_origin: default_mirror_origin(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }

    pub fn mirror_origin(&self) -> LayoutPos {
        LayoutPos::new(self.mirror_origin[0], self.mirror_origin[1])
    }
}

/// One `[[pattern]]` entry; exactly one of `literal` / `regex` is set
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternEntry {
    pub literal: Option<String>,
    pub regex: Option<String>,
    #[serde(default)]
    pub flags: String,
    pub color: Option<String>,
}

impl PatternEntry {
    fn spec(&self, index: usize) -> Result<PatternSpec, ConfigError> {
        match (&self.literal, &self.regex) {
            (Some(word), None) => Ok(PatternSpec::literal(word.as_str())),
            (None, Some(source)) => Ok(PatternSpec::regex(source.as_str(), self.flags.as_str())),
            (Some(_), Some(_)) => Err(ConfigError::InvalidPattern {
                index,
                reason: "both `literal` and `regex` are set",
            }),
            (None, None) => Err(ConfigError::InvalidPattern {
                index,
                reason: "one of `literal` or `regex` is required",
            }),
        }
    }
}

/// Settings file: engine tunables, viewport style and the pattern list
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HighlightConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub style: StyleMetrics,
    #[serde(default = "default_color")]
    pub default_color: String,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternEntry>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            style: StyleMetrics::default(),
            default_color: default_color(),
            patterns: Vec::new(),
        }
    }
}

impl HighlightConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, falling back to defaults when it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            patterns = config.patterns.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Pattern specs in file order plus their colors
    pub fn pattern_set(&self) -> Result<(Vec<PatternSpec>, ColorMap), ConfigError> {
        let mut colors = ColorMap::new(self.default_color.as_str());
        let mut specs = Vec::with_capacity(self.patterns.len());

        for (index, entry) in self.patterns.iter().enumerate() {
            let spec = entry.spec(index)?;
            if let Some(color) = &entry.color {
                colors.insert(spec.source(), color.as_str());
            }
            specs.push(spec);
        }
        Ok((specs, colors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::WhiteSpace;

    #[test]
    fn test_defaults() {
        let config = HighlightConfig::from_toml_str("").unwrap();

        assert_eq!(config, HighlightConfig::default());
        assert_eq!(config.engine.buffer_margin, 200.0);
        assert_eq!(config.engine.cache_threshold, 1000);
        assert_eq!(config.engine.poll_interval(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_full_file() {
        let config = HighlightConfig::from_toml_str(
            r#"
            default_color = "grey"

            [engine]
            buffer_margin = 50.0
            poll_interval_ms = 0

            [style]
            line_height = 18.0
            char_width = 8.0
            width = 400.0
            white_space = "pre"
            padding = { top = 2.0, left = 4.0 }

            [[pattern]]
            literal = "2330"
            color = "red"

            [[pattern]]
            regex = "\\d{4}-TW"
            flags = "gi"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.buffer_margin, 50.0);
        assert_eq!(config.engine.poll_interval(), None);
        assert_eq!(config.style.white_space, WhiteSpace::Pre);
        assert_eq!(config.style.padding.left, 4.0);
        assert_eq!(config.style.padding.right, 0.0);

        let (specs, colors) = config.pattern_set().unwrap();
        assert_eq!(specs[0], PatternSpec::literal("2330"));
        assert_eq!(specs[1], PatternSpec::regex("\\d{4}-TW", "gi"));
        assert_eq!(colors.color_for(&specs[0]).as_str(), "red");
        assert_eq!(colors.color_for(&specs[1]).as_str(), "grey");
    }

    #[test]
    fn test_invalid_pattern_entry() {
        let config = HighlightConfig::from_toml_str(
            r#"
            [[pattern]]
            color = "red"
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.pattern_set(),
            Err(ConfigError::InvalidPattern { index: 0, .. })
        ));
    }

    #[test]
    fn test_load_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();

        let missing = HighlightConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing, HighlightConfig::default());

        let path = dir.path().join("init.toml");
        std::fs::write(&path, "[[pattern]]\nliteral = \"x\"\n").unwrap();
        let loaded = HighlightConfig::load(&path).unwrap();
        assert_eq!(loaded.patterns.len(), 1);

        std::fs::write(&path, "[[pattern]\n").unwrap();
        assert!(matches!(HighlightConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
