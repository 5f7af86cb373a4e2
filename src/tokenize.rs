//! Segmentation and filtering of message text into candidate terms.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use clap::ValueEnum;
use jieba_rs::Jieba;
use log::debug;
use unicode_segmentation::UnicodeSegmentation;
use whatlang::Lang;

use crate::config::FilterOptions;

/// How text is split into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SegmenterKind {
    /// Pick per text: dictionary segmentation when it contains CJK ideographs, word boundaries otherwise
    #[default]
    Auto,
    /// Dictionary-based Chinese segmentation, lowercased
    Jieba,
    /// Unicode word boundaries, lowercased
    Words,
}

/// Drops segments that are too short or listed as stopwords.
#[derive(Debug, Clone)]
pub struct TermFilter {
    options: FilterOptions,
}

impl TermFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    /// Trimmed term if it survives the filter.
    pub fn accept<'a>(&self, segment: &'a str) -> Option<&'a str> {
        let term = segment.trim();
        if term.is_empty()
            || term.chars().count() < self.options.min_chars
            || self.options.stopwords.contains(term)
        {
            None
        } else {
            Some(term)
        }
    }
}

impl Default for TermFilter {
    fn default() -> Self {
        Self::new(FilterOptions::default())
    }
}

/// Splits text into filtered terms in occurrence order.
pub struct Tokenizer {
    kind: SegmenterKind,
    filter: TermFilter,
    jieba: OnceLock<Jieba>,
}

impl Tokenizer {
    pub fn new(kind: SegmenterKind, filter: TermFilter) -> Self {
        Self {
            kind,
            filter,
            jieba: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> SegmenterKind {
        self.kind
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let kind = match self.kind {
            SegmenterKind::Auto => detect_segmenter(text),
            k => k,
        };
        debug!("Segmenting {} bytes with {:?}", text.len(), kind);

        match kind {
            SegmenterKind::Jieba => {
                let jieba = self.jieba.get_or_init(Jieba::new);
                self.keep(jieba.cut(text, true))
            }
            _ => self.keep(text.unicode_words()),
        }
    }

    /// Lowercased segments that pass the filter.
    fn keep<'t>(&self, segments: impl IntoIterator<Item = &'t str>) -> Vec<String> {
        segments
            .into_iter()
            .filter_map(|seg| {
                let lower = seg.to_lowercase();
                self.filter.accept(&lower).map(String::from)
            })
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(SegmenterKind::default(), TermFilter::default())
    }
}

/// Dictionary segmentation whenever CJK ideographs occur, word boundaries otherwise.
///
/// Jieba also splits Latin runs, so mixed chats (links, English phrases)
/// keep both scripts.
pub fn detect_segmenter(text: &str) -> SegmenterKind {
    if text.chars().any(is_cjk) {
        return SegmenterKind::Jieba;
    }
    match whatlang::detect_lang(text) {
        Some(Lang::Cmn | Lang::Jpn) => SegmenterKind::Jieba,
        _ => SegmenterKind::Words,
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// Reads a stopword file: one word per line, blank lines and `#` comments skipped.
pub fn load_stopwords(path: &Path) -> std::io::Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}
