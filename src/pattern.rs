//! Pattern matching: literal and regex specs to ordered match lists

use ahash::AHashMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque color identifier handed through to the overlay sink
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorKey(Arc<str>);

impl ColorKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColorKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// What to look for
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSpec {
    /// Exact text, except the first character ignores case
    Literal(String),
    /// Regular expression with JS-style flag letters
    Regex {
        source: String,
        #[serde(default)]
        flags: String,
    },
}

impl PatternSpec {
    pub fn literal(word: impl Into<String>) -> Self {
        PatternSpec::Literal(word.into())
    }

    pub fn regex(source: impl Into<String>, flags: impl Into<String>) -> Self {
        PatternSpec::Regex {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// The word or regex source; also the key into a [`ColorMap`]
    pub fn source(&self) -> &str {
        match self {
            PatternSpec::Literal(word) => word,
            PatternSpec::Regex { source, .. } => source,
        }
    }
}

/// Word/regex source to color mapping
#[derive(Clone, Debug)]
pub struct ColorMap {
    by_source: AHashMap<String, ColorKey>,
    fallback: ColorKey,
}

impl ColorMap {
    pub fn new(fallback: impl Into<ColorKey>) -> Self {
        Self {
            by_source: AHashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with(mut self, source: impl Into<String>, color: impl Into<ColorKey>) -> Self {
        self.insert(source, color);
        self
    }

    pub fn insert(&mut self, source: impl Into<String>, color: impl Into<ColorKey>) {
        self.by_source.insert(source.into(), color.into());
    }

    pub fn color_for(&self, spec: &PatternSpec) -> ColorKey {
        self.by_source
            .get(spec.source())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::new("yellow")
    }
}

/// Why a pattern could not be compiled
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("empty literal pattern")]
    EmptyLiteral,
    #[error("unsupported regex flag `{flag}` in /{pattern}/")]
    UnknownFlag { flag: char, pattern: String },
    /// Valid in browser regex dialects, rejected by the linear-time engine
    #[error("regex /{pattern}/ uses {feature}, which is not supported")]
    Unsupported {
        pattern: String,
        feature: &'static str,
        #[source]
        error: regex::Error,
    },
    #[error("invalid regex /{pattern}/: {error}")]
    Regex {
        pattern: String,
        #[source]
        error: regex::Error,
    },
}

/// A located occurrence of a pattern, `start < end` (byte offsets)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub text: Arc<str>,
    pub color: ColorKey,
}

/// Regex escaping used for literal patterns
pub fn escape(literal: &str) -> String {
    regex::escape(literal)
}

/// Compile one spec into a regex with global/multiline semantics
pub fn compile(spec: &PatternSpec) -> Result<Regex, PatternError> {
    match spec {
        PatternSpec::Literal(word) => {
            let mut chars = word.chars();
            let first = chars.next().ok_or(PatternError::EmptyLiteral)?;
            let source = format!(
                "(?i:{}){}",
                escape(&first.to_string()),
                escape(chars.as_str())
            );
            build(&source, "", word)
        }
        PatternSpec::Regex { source, flags } => build(source, flags, source),
    }
}

fn build(source: &str, flags: &str, original: &str) -> Result<Regex, PatternError> {
    let mut builder = RegexBuilder::new(source);
    builder.multi_line(true);

    for flag in flags.chars() {
        match flag {
            // Global and sticky scanning is what find_iter does anyway
            'g' | 'm' | 'y' | 'u' => {}
            'i' => {
                builder.case_insensitive(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            _ => {
                return Err(PatternError::UnknownFlag {
                    flag,
                    pattern: original.to_string(),
                })
            }
        }
    }

    builder.build().map_err(|error| match unsupported_feature(source) {
        Some(feature) => PatternError::Unsupported {
            pattern: original.to_string(),
            feature,
            error,
        },
        None => PatternError::Regex {
            pattern: original.to_string(),
            error,
        },
    })
}

/// Name the construct a failed source most likely tripped on
fn unsupported_feature(source: &str) -> Option<&'static str> {
    if ["(?=", "(?!", "(?<=", "(?<!"].iter().any(|l| source.contains(l)) {
        return Some("look-around");
    }
    let bytes = source.as_bytes();
    let backreference = bytes
        .windows(2)
        .any(|w| w[0] == b'\\' && (b'1'..=b'9').contains(&w[1]));
    backreference.then_some("backreferences")
}

/// A spec after compilation; `regex` is `None` when compilation failed
#[derive(Clone, Debug)]
pub struct CompiledPattern {
    pub spec: PatternSpec,
    pub color: ColorKey,
    regex: Option<Regex>,
}

impl CompiledPattern {
    /// Compile, substituting a never-matching pattern on failure
    pub fn new(spec: PatternSpec, color: ColorKey) -> Self {
        let regex = match compile(&spec) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!(pattern = spec.source(), %err, "pattern disabled");
                None
            }
        };
        Self { spec, color, regex }
    }

    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    fn scan<'t>(&'t self, text: &'t str) -> impl Iterator<Item = Match> + 't {
        self.regex
            .iter()
            .flat_map(move |regex| regex.find_iter(text))
            .filter(|m| m.start() < m.end())
            .map(move |m| Match {
                start: m.start(),
                end: m.end(),
                text: Arc::from(m.as_str()),
                color: self.color.clone(),
            })
    }
}

/// The active pattern set, compiled once and reused across snapshots
#[derive(Clone, Debug, Default)]
pub struct CompiledPatterns {
    patterns: Vec<CompiledPattern>,
}

impl CompiledPatterns {
    pub fn new(specs: &[PatternSpec], colors: &ColorMap) -> Self {
        Self {
            patterns: specs
                .iter()
                .map(|spec| CompiledPattern::new(spec.clone(), colors.color_for(spec)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns that failed to compile and never match
    pub fn disabled_count(&self) -> usize {
        self.patterns.iter().filter(|p| !p.is_valid()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.patterns.iter()
    }

    /// Every match of every pattern, ordered by start
    ///
    /// Ties keep pattern order; identical spans from different patterns
    /// are all retained.
    pub fn find_matches(&self, text: &str) -> Vec<Match> {
        let mut matches: Vec<Match> = self.patterns.iter().flat_map(|p| p.scan(text)).collect();
        matches.sort_by_key(|m| m.start);
        matches
    }

    /// First hit of the first pattern (in configured order) that hits at all
    pub fn find_first(&self, text: &str) -> Option<Match> {
        self.patterns.iter().find_map(|p| p.scan(text).next())
    }
}

/// One-shot form of [`CompiledPatterns::find_matches`]
pub fn find_matches(text: &str, patterns: &[PatternSpec], colors: &ColorMap) -> Vec<Match> {
    CompiledPatterns::new(patterns, colors).find_matches(text)
}

/// One-shot form of [`CompiledPatterns::find_first`]
pub fn find_first(text: &str, patterns: &[PatternSpec], colors: &ColorMap) -> Option<Match> {
    CompiledPatterns::new(patterns, colors).find_first(text)
}
