//! # chat_cloud
//!
//! Relationship and activity reports over chat-history database exports,
//! each with a word cloud of the conversation.
//!
//! The interesting part is [`normalize`]: it turns skewed raw term counts
//! into tiered, bounded weights (with deliberate layout duplicates) so that no
//! single term swallows the canvas and the long tail stays legible. Around it
//! sit the collaborators: [`decode`] and [`tokenize`] prepare terms,
//! [`render`] lays out and rasterises the cloud, [`pipeline`] chains the
//! stages with graceful degradation, and [`report`] runs the SQL use-cases.
//!
//! ## Example
//! ```
//! use chat_cloud::normalize::normalize;
//!
//! let tokens = ["猫", "猫", "猫", "猫", "狗", "狗", "狗", "鸟", "鸟", "鱼"];
//! let weights = normalize(&tokens).unwrap();
//! assert_eq!(weights.get("猫", 0), Some(120.0));
//! assert_eq!(weights.get("鱼", 0), Some(40.0));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod tokenize;
pub mod upload;

use serde::Serialize;

pub use config::{CloudConfig, FilterOptions};
pub use error::{AnalysisError, RenderError, Result};
pub use export::{ExportFormat, csv_safe_cell, export_terms};
pub use normalize::{WeightedTerm, WeightedTermSet, normalize};
pub use pipeline::{CloudPipeline, Visualization};
pub use render::{CloudRenderer, Renderer};
pub use report::{
    AnalysisResult, GroupEntry, closest_contact, group_activity, list_groups, open_export,
};
pub use tokenize::{SegmenterKind, TermFilter, Tokenizer};

/// Body of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Groups { groups: Vec<GroupEntry> },
    Result { result: AnalysisResult },
    Error { error: String },
}

/// `{"success": bool, ...}` envelope printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Response {
    pub fn groups(groups: Vec<GroupEntry>) -> Self {
        Self {
            success: true,
            payload: Payload::Groups { groups },
        }
    }

    pub fn result(result: AnalysisResult) -> Self {
        Self {
            success: true,
            payload: Payload::Result { result },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Payload::Error {
                error: message.into(),
            },
        }
    }
}

/// Word cloud of a plain text, with a one-line summary as report text.
pub fn analyze_text<R: Renderer>(pipeline: &CloudPipeline<R>, text: &str) -> AnalysisResult {
    let cloud = pipeline.visualize(text);
    let summary = match &cloud {
        Some(c) => format!(
            "{} in the cloud ({}).\n",
            counted(c.terms.distinct_terms(), "distinct term", "distinct terms"),
            counted(c.terms.len(), "entry", "entries")
        ),
        None => "No usable terms found.\n".to_string(),
    };
    AnalysisResult::with_cloud(summary, cloud)
}

fn counted(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}
