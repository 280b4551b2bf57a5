//! Text blocks and their anchors.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Unit an anchor counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorUnit {
    Page,
    Paragraph,
    Line,
    Block,
}

impl AnchorUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Paragraph => "paragraph",
            Self::Line => "line",
            Self::Block => "block",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "paragraph" => Some(Self::Paragraph),
            "line" => Some(Self::Line),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

/// A human-readable locator such as `page 3` or `line 47`.
///
/// The index is 1-based and counts retained (non-blank) units only, so
/// anchors within one source are dense and strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Anchor {
    pub unit: AnchorUnit,
    pub index: usize,
}

impl Anchor {
    pub fn new(unit: AnchorUnit, index: usize) -> Self {
        Self { unit, index }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.unit.as_str(), self.index)
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.to_string()
    }
}

impl TryFrom<String> for Anchor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (unit, index) = value
            .split_once(' ')
            .ok_or_else(|| format!("malformed anchor: {value}"))?;
        let unit = AnchorUnit::parse(unit).ok_or_else(|| format!("unknown anchor unit: {unit}"))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| format!("malformed anchor index: {value}"))?;
        if index == 0 {
            return Err(format!("anchor index must be 1-based: {value}"));
        }
        Ok(Self { unit, index })
    }
}

/// One retained unit of normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Trimmed text of the unit
    pub text: String,

    /// Locator, unique within `source`
    pub anchor: Anchor,

    /// Key of the input this block came from
    pub source: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, anchor: Anchor, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchor,
            source: source.into(),
        }
    }

    /// Qualified locator used in prompts and evidence pointers.
    pub fn locator(&self) -> String {
        format!("{} | {}", self.source, self.anchor)
    }
}

/// Turn raw units into anchored blocks, dropping blank ones.
///
/// Anchors count retained units only: `["a", "  ", "b"]` yields
/// `line 1` and `line 2`.
pub fn anchor_units<I, S>(units: I, unit: AnchorUnit, source: &str) -> Vec<TextBlock>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    units
        .into_iter()
        .filter_map(|u| {
            let text = u.as_ref().trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .enumerate()
        .map(|(i, text)| TextBlock::new(text, Anchor::new(unit, i + 1), source))
        .collect()
}

/// SHA-256 fingerprint of the combined block text, for run logs.
pub fn fingerprint(blocks: &[TextBlock]) -> String {
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block.text.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
