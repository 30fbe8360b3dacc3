//! Step pattern compilation and matching.
//!
//! A step pattern is a plain sentence with typed placeholders, for example
//! `I wait for {int} seconds` or `I enter {string} into {string}`. Patterns
//! are compiled once into a [`CompiledPattern`], which can then be matched
//! against literal step phrases to extract typed arguments.
//!
//! # Placeholders
//!
//! - `{string}` - a double- or single-quoted run (quotes stripped) or a bare
//!   token with no whitespace
//! - `{int}` - a bare token that parses as a signed 64-bit integer
//! - `{float}` - a bare token that parses as a 64-bit float
//!
//! Matching is anchored: the whole phrase must be consumed.
//!
//! # Example
//!
//! ```
//! use appium_steps_core::pattern::{CompiledPattern, StepValue};
//!
//! let pattern = CompiledPattern::compile("I long press on {string} for {int}ms").unwrap();
//! let args = pattern.matches(r#"I long press on "avatar" for 3000ms"#).unwrap();
//! assert_eq!(args, vec![StepValue::String("avatar".into()), StepValue::Int(3000)]);
//! ```

use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while compiling a pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,

    #[error("Unterminated placeholder starting at byte {position}")]
    UnterminatedPlaceholder { position: usize },

    #[error("Unknown placeholder type '{{{name}}}'")]
    UnknownPlaceholder { name: String },

    /// Two placeholders with nothing between them cannot be segmented.
    #[error("Adjacent placeholders at byte {position} need a literal separator")]
    AdjacentPlaceholders { position: usize },
}

/// A captured token could not be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("argument {index} expected {kind}, got '{text}'")]
pub struct CoercionError {
    /// Zero-based position of the argument in the pattern.
    pub index: usize,
    /// The declared placeholder type.
    pub kind: PlaceholderKind,
    /// The raw captured text.
    pub text: String,
}

/// The declared type of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    String,
    Int,
    Float,
}

impl PlaceholderKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PlaceholderKind::String),
            "int" => Some(PlaceholderKind::Int),
            "float" => Some(PlaceholderKind::Float),
            _ => None,
        }
    }

    /// The name used inside braces in pattern text.
    pub fn name(&self) -> &'static str {
        match self {
            PlaceholderKind::String => "string",
            PlaceholderKind::Int => "int",
            PlaceholderKind::Float => "float",
        }
    }

    fn accepts(&self, text: &str) -> bool {
        match self {
            PlaceholderKind::String => true,
            PlaceholderKind::Int => text.parse::<i64>().is_ok(),
            PlaceholderKind::Float => text.parse::<f64>().is_ok(),
        }
    }

    fn sample(&self) -> &'static str {
        match self {
            PlaceholderKind::String => "\"sample\"",
            PlaceholderKind::Int => "3",
            PlaceholderKind::Float => "1.5",
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(PlaceholderKind),
}

/// A typed argument extracted from a step phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl StepValue {
    pub fn kind(&self) -> PlaceholderKind {
        match self {
            StepValue::String(_) => PlaceholderKind::String,
            StepValue::Int(_) => PlaceholderKind::Int,
            StepValue::Float(_) => PlaceholderKind::Float,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            StepValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Floats accept integer captures as well.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StepValue::Float(n) => Some(*n),
            StepValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl fmt::Display for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepValue::String(s) => write!(f, "\"{}\"", s),
            StepValue::Int(n) => write!(f, "{}", n),
            StepValue::Float(n) => write!(f, "{}", n),
        }
    }
}

/// An untyped capture: the placeholder it belongs to and the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArg {
    pub kind: PlaceholderKind,
    pub text: String,
}

/// Ordering key used to pick between patterns matching the same phrase.
///
/// More literal characters wins; on equal literal length, fewer placeholders
/// wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literal_chars: usize,
    placeholders: Reverse<usize>,
}

/// A compiled step pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    segments: Vec<Segment>,
}

/// A placeholder candidate: the captured value and how many bytes it consumed.
struct Candidate {
    value: String,
    consumed: usize,
}

impl CompiledPattern {
    /// Compiles pattern text into a matcher.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.trim().is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;
        let mut offset = 0usize;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];
            let close = after_open.find('}').ok_or(PatternError::UnterminatedPlaceholder {
                position: offset + open,
            })?;
            let name = &after_open[..close];
            let kind = PlaceholderKind::from_name(name).ok_or_else(|| {
                PatternError::UnknownPlaceholder {
                    name: name.to_string(),
                }
            })?;

            if literal.is_empty() {
                if let Some(Segment::Placeholder(_)) = segments.last() {
                    return Err(PatternError::AdjacentPlaceholders {
                        position: offset + open,
                    });
                }
            } else {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(kind));

            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as registered.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder types in order of appearance.
    pub fn placeholders(&self) -> Vec<PlaceholderKind> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(kind) => Some(*kind),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn literal_chars(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.chars().count(),
                Segment::Placeholder(_) => 0,
            })
            .sum()
    }

    pub fn specificity(&self) -> Specificity {
        Specificity {
            literal_chars: self.literal_chars(),
            placeholders: Reverse(self.placeholders().len()),
        }
    }

    /// Shape match: literals line up and every placeholder captured a token.
    ///
    /// Numeric placeholders are not validated here; use [`coerce`](Self::coerce)
    /// or [`matches`](Self::matches) for typed results.
    pub fn capture(&self, phrase: &str) -> Option<Vec<RawArg>> {
        let mut out = Vec::new();
        self.match_from(0, phrase, 0, false, &mut out).then_some(out)
    }

    /// Typed match. Returns `None` if the phrase does not match or a numeric
    /// placeholder cannot be parsed under any segmentation.
    pub fn matches(&self, phrase: &str) -> Option<Vec<StepValue>> {
        let mut out = Vec::new();
        if !self.match_from(0, phrase, 0, true, &mut out) {
            return None;
        }
        self.coerce(&out).ok()
    }

    /// Converts raw captures to typed values.
    pub fn coerce(&self, raw: &[RawArg]) -> Result<Vec<StepValue>, CoercionError> {
        raw.iter()
            .enumerate()
            .map(|(index, arg)| {
                let err = || CoercionError {
                    index,
                    kind: arg.kind,
                    text: arg.text.clone(),
                };
                match arg.kind {
                    PlaceholderKind::String => Ok(StepValue::String(arg.text.clone())),
                    PlaceholderKind::Int => {
                        arg.text.parse().map(StepValue::Int).map_err(|_| err())
                    }
                    PlaceholderKind::Float => {
                        arg.text.parse().map(StepValue::Float).map_err(|_| err())
                    }
                }
            })
            .collect()
    }

    /// A phrase built by substituting a sample value into every placeholder.
    pub fn example_phrase(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(kind) => kind.sample(),
            })
            .collect()
    }

    /// Editor snippet with numbered tab stops, e.g. `I tap on "${1:text}"`.
    pub fn snippet(&self) -> String {
        let mut out = String::new();
        let mut stop = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(kind) => {
                    stop += 1;
                    match kind {
                        PlaceholderKind::String => out.push_str(&format!("\"${{{}:text}}\"", stop)),
                        PlaceholderKind::Int => out.push_str(&format!("${{{}:0}}", stop)),
                        PlaceholderKind::Float => out.push_str(&format!("${{{}:0.0}}", stop)),
                    }
                }
            }
        }
        out
    }

    /// Whether some phrase could plausibly match both patterns.
    ///
    /// Two patterns overlap when they share a literal skeleton (placeholder
    /// types may differ) or when either one's example phrase matches the other.
    pub fn may_overlap(&self, other: &CompiledPattern) -> bool {
        let same_skeleton = self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Placeholder(_), Segment::Placeholder(_)) => true,
                    _ => false,
                });
        same_skeleton
            || self.capture(&other.example_phrase()).is_some()
            || other.capture(&self.example_phrase()).is_some()
    }

    fn match_from(
        &self,
        index: usize,
        phrase: &str,
        pos: usize,
        typed: bool,
        out: &mut Vec<RawArg>,
    ) -> bool {
        let Some(segment) = self.segments.get(index) else {
            return pos == phrase.len();
        };
        let rest = &phrase[pos..];
        match segment {
            Segment::Literal(text) => {
                rest.starts_with(text.as_str())
                    && self.match_from(index + 1, phrase, pos + text.len(), typed, out)
            }
            Segment::Placeholder(kind) => {
                for candidate in candidates(*kind, rest) {
                    if typed && !kind.accepts(&candidate.value) {
                        continue;
                    }
                    out.push(RawArg {
                        kind: *kind,
                        text: candidate.value,
                    });
                    if self.match_from(index + 1, phrase, pos + candidate.consumed, typed, out) {
                        return true;
                    }
                    out.pop();
                }
                false
            }
        }
    }
}

impl fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for CompiledPattern {}

/// Enumerates capture candidates at the start of `rest`, preferred first.
fn candidates(kind: PlaceholderKind, rest: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let first = rest.chars().next();

    if kind == PlaceholderKind::String {
        if let Some(quote @ ('"' | '\'')) = first {
            if let Some(candidate) = quoted(rest, quote) {
                out.push(candidate);
            }
            // A token starting with a quote is never a bare capture.
            return out;
        }
    }

    let token_len = rest
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(rest.len(), |(i, _)| i);
    let token = &rest[..token_len];
    let mut ends: Vec<usize> = token.char_indices().map(|(i, c)| i + c.len_utf8()).collect();
    ends.reverse();
    out.extend(ends.into_iter().map(|end| Candidate {
        value: token[..end].to_string(),
        consumed: end,
    }));
    out
}

/// Reads a quoted run starting at `rest[0]`, honouring backslash escapes.
fn quoted(rest: &str, quote: char) -> Option<Candidate> {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) if escaped == quote || escaped == '\\' => value.push(escaped),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return None,
            },
            c if c == quote => {
                return Some(Candidate {
                    value,
                    consumed: i + c.len_utf8(),
                })
            }
            c => value.push(c),
        }
    }
    None
}
