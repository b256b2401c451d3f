//! Header-aware text chunking
//!
//! Two passes:
//!
//! 1. **Header split**: markdown headers (`#` up to the configured level) open
//!    a section. The section title is the path of enclosing headers joined by
//!    `": "`; header lines stay in the section content.
//! 2. **Recursive split**: sections longer than `chunk_size` characters are
//!    split on paragraph breaks, then line breaks, then spaces, then grapheme
//!    clusters, and the pieces are merged back into chunks of at most
//!    `chunk_size` characters with `chunk_overlap` characters carried over.
//!
//! # Usage
//!
//! ```ignore
//! use docqa_rag::chunker::{ChunkConfig, MarkdownChunker};
//!
//! let chunker = MarkdownChunker::new(ChunkConfig::default());
//! let chunks = chunker.chunk("# Policy\n\nRefunds within 30 days.");
//! ```

use std::collections::VecDeque;

use docqa_config::IngestionConfig;
use docqa_core::Chunk;
use unicode_segmentation::UnicodeSegmentation;

/// Separators tried in order before falling back to graphemes
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunking configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks
    pub chunk_overlap: usize,
    /// Deepest header level that opens a section (1..=6)
    pub max_header_level: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl From<&IngestionConfig> for ChunkConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_header_level: config.max_header_level,
        }
    }
}

/// A run of markdown under one header path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
}

/// Markdown header splitter followed by a recursive character splitter
#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    config: ChunkConfig,
}

impl MarkdownChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Split a markdown document into titled chunks
    pub fn chunk(&self, markdown: &str) -> Vec<Chunk> {
        self.split_sections(markdown)
            .into_iter()
            .flat_map(|section| {
                split_text(
                    &section.content,
                    self.config.chunk_size,
                    self.config.chunk_overlap,
                )
                .into_iter()
                .map(move |content| Chunk::new(section.title.clone(), content))
            })
            .collect()
    }

    /// Split on markdown headers
    ///
    /// Headers inside fenced code blocks are ignored. Sections with no text
    /// besides their header are dropped.
    pub fn split_sections(&self, markdown: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut path: Vec<(usize, String)> = Vec::new();
        let mut lines: Vec<&str> = Vec::new();
        let mut has_body = false;
        let mut in_fence = false;

        for line in markdown.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
            }

            let header = if in_fence {
                None
            } else {
                parse_header(line, self.config.max_header_level)
            };

            match header {
                Some((level, text)) => {
                    if has_body {
                        sections.push(Section {
                            title: join_path(&path),
                            content: lines.join("\n").trim().to_string(),
                        });
                    }
                    lines.clear();
                    has_body = false;

                    path.retain(|(l, _)| *l < level);
                    path.push((level, text));
                    lines.push(line);
                }
                None => {
                    if !line.trim().is_empty() {
                        has_body = true;
                    }
                    lines.push(line);
                }
            }
        }

        if has_body {
            sections.push(Section {
                title: join_path(&path),
                content: lines.join("\n").trim().to_string(),
            });
        }

        sections
    }
}

fn parse_header(line: &str, max_level: usize) -> Option<(usize, String)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > max_level {
        return None;
    }

    let rest = &line[level..];
    // "#tag" is not a header; "#" alone is an empty one
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        return None;
    }
    Some((level, text.to_string()))
}

fn join_path(path: &[(usize, String)]) -> String {
    path.iter()
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join(": ")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Recursively split `text` into chunks of at most `chunk_size` characters
///
/// Single graphemes longer than `chunk_size` are kept whole.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    split_recursive(text, &SEPARATORS, chunk_size.max(1), chunk_overlap)
        .into_iter()
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.trim().to_string()];
    }

    // First separator present in the text; graphemes when none is
    let position = separators.iter().position(|sep| text.contains(sep));
    let (pieces, remaining): (Vec<&str>, &[&str]) = match position {
        Some(i) => (split_keep_separator(text, separators[i]), &separators[i + 1..]),
        None => (text.graphemes(true).collect(), &[]),
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
            fitting.clear();
        }

        if position.is_some() {
            chunks.extend(split_recursive(piece, remaining, chunk_size, chunk_overlap));
        } else {
            // A single grapheme wider than a chunk
            chunks.push(piece.to_string());
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
    }

    chunks
}

/// Split so that every piece after the first starts with `separator`
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Greedily pack pieces into chunks, carrying up to `chunk_overlap` over
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > chunk_size && !window.is_empty() {
            let chunk: String = window.iter().copied().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    let chunk: String = window.iter().copied().collect();
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> MarkdownChunker {
        MarkdownChunker::new(ChunkConfig {
            chunk_size,
            chunk_overlap,
            max_header_level: 6,
        })
    }

    #[test]
    fn test_header_paths() {
        let markdown = "\
Intro text.

# Returns

General returns policy.

## Refunds

Refunds within 30 days.

## Exchanges

Exchange any item.

# Shipping

Free over $50.";

        let sections = chunker(500, 50).split_sections(markdown);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["", "Returns", "Returns: Refunds", "Returns: Exchanges", "Shipping"]
        );
        // Header lines are kept in the content
        assert_eq!(sections[2].content, "## Refunds\n\nRefunds within 30 days.");
    }

    #[test]
    fn test_header_only_sections_dropped() {
        let sections = chunker(500, 50).split_sections("# Title\n## Sub\n\nBody");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Title: Sub");
    }

    #[test]
    fn test_headers_in_code_fence_ignored() {
        let markdown = "# Setup\n\n```bash\n# install\npip install x\n```";
        let sections = chunker(500, 50).split_sections(markdown);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Setup");
    }

    #[test]
    fn test_max_header_level() {
        let chunker = MarkdownChunker::new(ChunkConfig {
            chunk_size: 500,
            chunk_overlap: 50,
            max_header_level: 1,
        });
        let sections = chunker.split_sections("# A\n\none\n\n## B\n\ntwo");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "A");
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("## Refunds ##", 6), Some((2, "Refunds".to_string())));
        assert_eq!(parse_header("#hashtag", 6), None);
        assert_eq!(parse_header("####### Seven", 6), None);
        assert_eq!(parse_header("#", 6), None);
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(split_text("  short text  ", 500, 50), vec!["short text"]);
    }

    #[test]
    fn test_split_respects_size_and_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_text(text, 15, 6);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 15, "{chunk:?}");
        }
        // Consecutive chunks share a word
        assert_eq!(chunks[0], "one two three");
        assert!(chunks[1].starts_with("three"));
    }

    #[test]
    fn test_split_prefers_paragraphs() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = split_text(text, 25, 0);
        assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn test_grapheme_fallback() {
        let text = "ééééééééé";
        let chunks = split_text(text, 4, 0);
        assert_eq!(chunks, vec!["éééé", "éééé", "é"]);
    }

    #[test]
    fn test_chunk_carries_titles() {
        let chunks =
            chunker(30, 0).chunk("# Policy\n\nRefunds are accepted within thirty days.");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.title == "Policy"));
        assert!(chunks.iter().all(|c| char_len(&c.content) <= 30));
    }
}
