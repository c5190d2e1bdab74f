//! Section-aware chunking of extracted manual pages.
//!
//! Splits a page's text into word-bounded spans with a trailing overlap
//! carried into the next span, preferring sentence boundaries near the end
//! of a span over hard word cuts. Heading detection only annotates chunks
//! with a section title; it never discards text.

use regex::Regex;
use std::sync::OnceLock;

/// A text span produced from one page, consumed immediately by the
/// ingestion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk {
    pub text: String,
    pub page_number: u32,
    pub section_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target maximum span length, in words.
    pub max_words: usize,
    /// Trailing words repeated at the start of the next span.
    pub overlap_words: usize,
    /// Spans shorter than this are dropped as noise.
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 800, overlap_words: 200, min_words: 5 }
    }
}

fn enumeration_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s+").expect("valid enumeration pattern"))
}

fn chapter_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^chapter\s+\d+").expect("valid chapter pattern"))
}

/// Classify the first line of a text block as a section heading.
///
/// A heading is shorter than 100 characters and either fully upper-case,
/// enumerated (`3. ` / `3) `), or a "Chapter N" line.
pub fn detect_section_title(text: &str) -> Option<String> {
    let first_line = text.trim().lines().next()?.trim();
    if first_line.is_empty() || first_line.chars().count() >= 100 {
        return None;
    }
    let has_letters = first_line.chars().any(|c| c.is_alphabetic());
    let all_upper = has_letters && !first_line.chars().any(|c| c.is_lowercase());
    if all_upper
        || enumeration_pattern().is_match(first_line)
        || chapter_pattern().is_match(first_line)
    {
        return Some(first_line.to_string());
    }
    None
}

/// Split one page's text into overlap-preserving spans.
///
/// A page at or under `max_words` yields exactly one chunk. When a span has
/// a sentence boundary (`". "`) within its last 20%, the cut moves there so
/// the span does not end mid-sentence.
pub fn chunk_page(text: &str, page_number: u32, config: &ChunkingConfig) -> Vec<PageChunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() <= config.max_words {
        if words.len() < config.min_words {
            return Vec::new();
        }
        return vec![PageChunk {
            text: trimmed.to_string(),
            page_number,
            section_title: detect_section_title(trimmed),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let mut end = (start + config.max_words).min(words.len());

        if end < words.len() {
            let candidate = words[start..end].join(" ");
            let tail_start = candidate.len() * 4 / 5;
            if let Some(cut) = rfind_from(&candidate, ". ", tail_start) {
                // `cut` is the byte offset of the period; keep it.
                let kept_words = candidate[..=cut].split_whitespace().count();
                if kept_words > 0 {
                    end = start + kept_words;
                }
            }
        }

        let span = words[start..end].join(" ");
        if span.split_whitespace().count() >= config.min_words {
            chunks.push(PageChunk {
                section_title: detect_section_title(&span),
                text: span,
                page_number,
            });
        }

        if end >= words.len() {
            break;
        }
        // Next span starts `overlap_words` before the cut; never move
        // backwards past the current start.
        start = end.saturating_sub(config.overlap_words).max(start + 1);
    }
    chunks
}

fn rfind_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let mut from = from.min(haystack.len());
    while from > 0 && !haystack.is_char_boundary(from) {
        from -= 1;
    }
    haystack[from..].rfind(needle).map(|i| from + i)
}
