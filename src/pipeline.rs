//! Raw text to word-cloud image, one stage after another.
//!
//! Every stage degrades to "no visualization" instead of failing the caller:
//! reports stay useful when the cloud cannot be produced.

use log::{debug, info, warn};

use crate::decode::unescape;
use crate::normalize::{WeightedTermSet, normalize};
use crate::render::{Renderer, encode_base64};
use crate::tokenize::Tokenizer;

/// Weighted terms of a text and, when rendering succeeded, their PNG cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    pub terms: WeightedTermSet,
    pub png: Option<Vec<u8>>,
}

impl Visualization {
    pub fn png_base64(&self) -> Option<String> {
        self.png.as_deref().map(encode_base64)
    }
}

pub struct CloudPipeline<R> {
    tokenizer: Tokenizer,
    renderer: R,
}

impl<R: Renderer> CloudPipeline<R> {
    pub fn new(tokenizer: Tokenizer, renderer: R) -> Self {
        Self {
            tokenizer,
            renderer,
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Decode, segment, filter and normalize. `None` when no term survives.
    pub fn weigh(&self, raw: &str) -> Option<WeightedTermSet> {
        debug!("Input text: {} bytes", raw.len());
        let text = match unescape(raw) {
            Ok(text) => text,
            Err(e) => {
                warn!("Escape decoding failed, using raw text: {e}");
                raw.into()
            }
        };

        let terms = self.tokenizer.tokenize(&text);
        debug!("{} terms after filtering", terms.len());
        let weighted = normalize(&terms);
        match &weighted {
            Some(set) => {
                let top: Vec<(&str, f64)> = set
                    .iter()
                    .take(10)
                    .map(|e| (e.source_term.as_str(), e.weight))
                    .collect();
                debug!("Top weights: {top:?}");
            }
            None => info!("No usable terms; skipping word cloud"),
        }
        weighted
    }

    /// Full pipeline. `None` when no term survives; renderer failures are
    /// logged and leave the image absent.
    pub fn visualize(&self, raw: &str) -> Option<Visualization> {
        let terms = self.weigh(raw)?;
        let png = match self.renderer.render(&terms) {
            Ok(png) => {
                info!("Rendered word cloud: {} bytes", png.len());
                Some(png)
            }
            Err(e) => {
                warn!("Word cloud rendering failed: {e}");
                None
            }
        };
        Some(Visualization { terms, png })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::tokenize::{SegmenterKind, TermFilter};
    use std::cell::Cell;

    struct StubRenderer {
        calls: Cell<usize>,
        fail: bool,
    }

    impl StubRenderer {
        fn new(fail: bool) -> Self {
            Self {
                calls: Cell::new(0),
                fail,
            }
        }
    }

    impl Renderer for StubRenderer {
        fn render(&self, terms: &WeightedTermSet) -> Result<Vec<u8>, RenderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(RenderError::Backend("boom".into()))
            } else {
                Ok(vec![terms.len() as u8])
            }
        }
    }

    fn pipeline(fail: bool) -> CloudPipeline<StubRenderer> {
        CloudPipeline::new(
            Tokenizer::new(SegmenterKind::Words, TermFilter::default()),
            StubRenderer::new(fail),
        )
    }

    #[test]
    fn renders_weighted_terms() {
        let p = pipeline(false);
        let vis = p.visualize("apple banana apple cherry").unwrap();
        assert_eq!(vis.terms.distinct_terms(), 3);
        assert_eq!(vis.png, Some(vec![3]));
        assert_eq!(vis.png_base64().as_deref(), Some("Aw=="));
    }

    #[test]
    fn empty_after_filtering_skips_renderer() {
        let p = pipeline(false);
        assert!(p.visualize("a b c").is_none());
        assert!(p.visualize("").is_none());
        assert_eq!(p.renderer().calls.get(), 0);
    }

    #[test]
    fn renderer_failure_leaves_image_absent() {
        let p = pipeline(true);
        let vis = p.visualize("apple banana").unwrap();
        assert!(vis.png.is_none());
        assert!(vis.png_base64().is_none());
        assert_eq!(vis.terms.distinct_terms(), 2);
        assert_eq!(p.renderer().calls.get(), 1);
    }

    #[test]
    fn escapes_are_decoded_before_segmentation() {
        let p = pipeline(false);
        let set = p.weigh(r"caf\u00e9 caf\u00e9 tea").unwrap();
        assert_eq!(set.get("café", 0), Some(120.0));
    }

    #[test]
    fn malformed_escapes_fall_back_to_raw_text() {
        let p = pipeline(false);
        let set = p.weigh(r"apple \u12 apple").unwrap();
        assert!(set.get("apple", 0).is_some());
    }
}
