//! Chapter-aware text segmenter.
//!
//! Splits a document into [`TextBlock`]s of at most `max_chars` characters,
//! cutting after sentence punctuation where possible.  Chapter markers
//! (`Chapter 12`, `Capítulo 3`, …) at the start of a line open a new chapter;
//! text before the first marker belongs to the first chapter.
//!
//! Chapter numbers come from the marker digits.  A number that does not parse,
//! is zero, or was already used falls back to the region's position, and then
//! to one past the largest number assigned so far, so block ids stay unique.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Maximum characters per block.
pub const MAX_CHARS: usize = 1550;

/// Punctuation a block may end on.
const SENTENCE_END: [char; 4] = ['.', '!', '?', ':'];

/// Chapter keywords recognised by default (matched case-insensitively).
pub const DEFAULT_CHAPTER_KEYWORDS: &[&str] = &["chapter", "capítulo", "capitulo"];

static DEFAULT_MARKER: Lazy<Regex> = Lazy::new(|| {
    // The keywords are fixed literals, so the pattern always compiles.
    marker_regex(DEFAULT_CHAPTER_KEYWORDS).unwrap()
});

/// Compiled-size cap for the marker pattern (the `regex` default).
const MARKER_SIZE_LIMIT: usize = 10 * (1 << 20);

fn marker_regex<S: AsRef<str>>(keywords: &[S]) -> Result<Regex, regex::Error> {
    marker_regex_with_limit(keywords, MARKER_SIZE_LIMIT)
}

fn marker_regex_with_limit<S: AsRef<str>>(
    keywords: &[S],
    size_limit: usize,
) -> Result<Regex, regex::Error> {
    let alternatives = keywords
        .iter()
        .map(|k| regex::escape(k.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!(r"^[ \t]*(?:{})[ \t]+(\d+)", alternatives))
        .case_insensitive(true)
        .multi_line(true)
        .size_limit(size_limit)
        .build()
}

/// Marker pattern for `keywords`, or `None` (no chapter detection) when it
/// cannot be compiled, e.g. a keyword list too large for `size_limit`.
fn marker_or_none(keywords: &[&str], size_limit: usize) -> Option<Regex> {
    match marker_regex_with_limit(keywords, size_limit) {
        Ok(marker) => Some(marker),
        Err(e) => {
            log::warn!(
                "Chapter detection disabled: cannot build marker pattern for {} keyword(s): {}",
                keywords.len(),
                e
            );
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// Processing state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            BlockStatus::Pending => "pending",
            BlockStatus::Processing => "processing",
            BlockStatus::Success => "success",
            BlockStatus::Error => "error",
        })
    }
}

/// A bounded span of document text; the unit of remote synthesis work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// `"{chapter}.{block_in_chapter}"`, unique within one segmentation.
    pub id: String,
    pub chapter: u32,
    pub block_in_chapter: u32,
    pub text: String,
    pub status: BlockStatus,
}

impl TextBlock {
    fn new(chapter: u32, block_in_chapter: u32, text: &str) -> Self {
        Self {
            id: format!("{}.{}", chapter, block_in_chapter),
            chapter,
            block_in_chapter,
            text: text.to_string(),
            status: BlockStatus::Pending,
        }
    }

    /// Download name of this block's audio file.
    pub fn file_name(&self) -> String {
        format!("chapter_{}_block_{}.wav", self.chapter, self.block_in_chapter)
    }

    /// The first `max_chars` characters of the text.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segmenter
// ─────────────────────────────────────────────────────────────────────────────

/// Segmenter settings.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub max_chars: usize,
    pub chapter_keywords: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHARS,
            chapter_keywords: DEFAULT_CHAPTER_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Splits documents into [`TextBlock`]s.
#[derive(Debug, Clone)]
pub struct Segmenter {
    max_chars: usize,
    marker: Option<Regex>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self { max_chars: MAX_CHARS, marker: Some(DEFAULT_MARKER.clone()) }
    }
}

impl Segmenter {
    /// Build a segmenter from `config`.
    ///
    /// An empty keyword list disables chapter detection, as does a keyword
    /// list whose pattern cannot be compiled (logged as a warning).
    /// `max_chars` of zero is raised to one.
    pub fn new(config: &SegmenterConfig) -> Self {
        let max_chars = config.max_chars.max(1);
        let keywords: Vec<&str> = config
            .chapter_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        let marker = if keywords.is_empty() {
            None
        } else {
            marker_or_none(&keywords, MARKER_SIZE_LIMIT)
        };
        Self { max_chars, marker }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Segment `text` into blocks in document order.
    pub fn segment(&self, text: &str) -> Vec<TextBlock> {
        let mut blocks = Vec::new();
        let mut used = HashSet::new();
        let mut highest = 0u32;

        for (position, (digits, region)) in self.chapter_regions(text).into_iter().enumerate() {
            let parsed = digits.and_then(|d| d.parse::<u32>().ok());
            let position = u32::try_from(position + 1).unwrap_or(u32::MAX);
            let chapter = match parsed {
                Some(n) if n >= 1 && !used.contains(&n) => n,
                _ if !used.contains(&position) => position,
                _ => highest.saturating_add(1),
            };
            used.insert(chapter);
            highest = highest.max(chapter);

            let pieces = split_sentences(region, self.max_chars);
            for (i, piece) in pieces.iter().enumerate() {
                blocks.push(TextBlock::new(chapter, i as u32 + 1, piece));
            }
            log::debug!("chapter {}: {} block(s)", chapter, pieces.len());
        }

        blocks
    }

    /// Cut `text` into chapter regions, each paired with its marker digits.
    ///
    /// Regions start at marker line starts; the text before the first marker
    /// is folded into the first region.  Without markers the whole text is a
    /// single unnumbered region.
    fn chapter_regions<'a>(&self, text: &'a str) -> Vec<(Option<&'a str>, &'a str)> {
        let markers: Vec<(usize, &str)> = match &self.marker {
            Some(marker) => marker
                .captures_iter(text)
                .filter_map(|c| Some((c.get(0)?.start(), c.get(1)?.as_str())))
                .collect(),
            None => Vec::new(),
        };

        if markers.is_empty() {
            return vec![(None, text)];
        }

        let mut regions = Vec::with_capacity(markers.len());
        for (i, &(_, digits)) in markers.iter().enumerate() {
            let start = if i == 0 { 0 } else { markers[i].0 };
            let end = markers.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
            regions.push((Some(digits), &text[start..end]));
        }
        regions
    }
}

/// Segment `text` with the default settings.
pub fn segment(text: &str) -> Vec<TextBlock> {
    Segmenter::default().segment(text)
}

/// Split one chapter's text into trimmed pieces of at most `max_chars`
/// characters, each ending on sentence punctuation unless a hard cut was
/// needed or it is the tail of the text.
fn split_sentences(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        // Sentence-ending marks are ASCII, so `i + 1` is a char boundary.
        let cut = window
            .rfind(SENTENCE_END)
            .map(|i| i + 1)
            .unwrap_or(window_end);

        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        rest = rest[cut..].trim_start();
    }

    pieces
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
