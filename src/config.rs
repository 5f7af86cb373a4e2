//! Tuning constants and the configuration values built from them.
//!
//! Everything that shapes the rendered cloud lives here so that adjusting the
//! visual balance is a one-place change. Values are passed explicitly to the
//! tokenizer and renderer; nothing in the crate reads process-global state.

use std::collections::HashSet;
use std::path::PathBuf;

/// Canvas width in pixels.
pub const CANVAS_WIDTH: u32 = 400;
/// Canvas height in pixels.
pub const CANVAS_HEIGHT: u32 = 400;
/// Maximum number of entries drawn, duplicates included.
pub const MAX_WORDS: usize = 80;
/// Smallest font size the layout will place.
pub const MIN_FONT_SIZE: u32 = 9;
/// Font size of the heaviest entry.
pub const MAX_FONT_SIZE: u32 = 120;
/// Probability in [0, 1] that an entry is laid out horizontally.
pub const PREFER_HORIZONTAL: f64 = 0.5;
/// How strongly weight differences translate into font size differences, in [0, 1].
pub const RELATIVE_SCALING: f64 = 0.7;
/// Free pixels kept around every placed entry.
pub const MARGIN: u32 = 1;
/// Font size decrement when an entry does not fit.
pub const FONT_STEP: u32 = 1;
/// Seed of the layout RNG.
pub const RANDOM_SEED: u64 = 42;
/// Canvas background colour.
pub const BACKGROUND: (u8, u8, u8) = (255, 255, 255);

/// Terms with fewer characters than this are dropped.
pub const MIN_TERM_CHARS: usize = 2;

/// Fonts with CJK coverage probed in order when no font is configured.
pub const FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/PingFang.ttc",
    "C:/Windows/Fonts/simhei.ttf",
    "C:/Windows/Fonts/msyh.ttc",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/wqy-microhei/wqy-microhei.ttc",
];

/// Chinese particles and function words that carry no topic.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "的", "了", "吗", "吧", "啊", "呢", "么", "哦", "哈", "呀", "嘛", "啦", "着", "呵", "哎", "唉",
    "哼", "嗯", "这", "那", "就", "是", "也", "和", "与", "或", "在", "上", "下", "中", "里", "到",
    "为", "及", "等", "把", "要", "会", "对", "能", "都", "还", "去", "说", "来", "做", "看", "想",
    "得", "过", "没", "有", "好", "被", "将", "从", "更", "又", "并",
];

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub width: u32,
    pub height: u32,
    pub background: (u8, u8, u8),
    pub max_words: usize,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub prefer_horizontal: f64,
    pub relative_scaling: f64,
    pub margin: u32,
    pub font_step: u32,
    pub random_seed: u64,
    /// Explicit font file; when `None` the [`FONT_CANDIDATES`] are probed.
    pub font_path: Option<PathBuf>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            background: BACKGROUND,
            max_words: MAX_WORDS,
            min_font_size: MIN_FONT_SIZE,
            max_font_size: MAX_FONT_SIZE,
            prefer_horizontal: PREFER_HORIZONTAL,
            relative_scaling: RELATIVE_SCALING,
            margin: MARGIN,
            font_step: FONT_STEP,
            random_seed: RANDOM_SEED,
            font_path: None,
        }
    }
}

impl CloudConfig {
    /// Font files to try, explicit path first.
    pub fn font_candidates(&self) -> Vec<PathBuf> {
        match &self.font_path {
            Some(p) => vec![p.clone()],
            None => FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Term filter configuration: the two recognised filter options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub min_chars: usize,
    pub stopwords: HashSet<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_chars: MIN_TERM_CHARS,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
