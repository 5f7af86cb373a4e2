//! Frequency normalization: filtered terms in, rendering-ready weights out.
//!
//! Raw chat frequencies are heavily skewed: a handful of terms dominate a long
//! tail. Feeding them straight to an area-proportional layout makes the top
//! term swallow the canvas while the tail renders unreadably small. The
//! normalizer therefore keeps the 30 most frequent terms and maps them into a
//! bounded weight space in three rank tiers:
//!
//! | Tier | Ranks | Weight (range > 0)                   | Weight (range = 0) | Extra entries              |
//! |------|-------|--------------------------------------|--------------------|----------------------------|
//! | High | 0–9   | `40 + ((c - min) / range)^0.5 * 80`  | 80                 | none                       |
//! | Mid  | 10–19 | `25 + ((c - min) / range)^0.6 * 35`  | 35                 | one at 0.8 × primary       |
//! | Low  | 20–29 | `15 + (i mod 3) * 2`, count ignored  | same               | two at base × 0.9 and 1.0  |
//!
//! The extra entries are a presentation device. The layout packs shapes by
//! area, and repeated mid/low terms at slightly varied sizes fill the gaps
//! around the few large high-tier terms. They do **not** mean the term
//! occurred more often; reporting code must count source terms, not entries.

use std::collections::HashMap;

use serde::Serialize;

/// Number of distinct terms kept for visualization.
pub const TOP_K: usize = 30;
/// Ranks per tier.
pub const TIER_SIZE: usize = 10;

/// Rank band of a selected term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Mid,
    Low,
}

impl Tier {
    /// Tier of a 0-based rank inside the top-K selection.
    pub fn for_rank(rank: usize) -> Tier {
        match rank / TIER_SIZE {
            0 => Tier::High,
            1 => Tier::Mid,
            _ => Tier::Low,
        }
    }

    fn rule(self) -> &'static TierRule {
        match self {
            Tier::High => &HIGH,
            Tier::Mid => &MID,
            Tier::Low => &LOW,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::High => "high",
            Tier::Mid => "mid",
            Tier::Low => "low",
        };
        f.write_str(s)
    }
}

enum BaseWeight {
    /// `floor + norm^exponent * span`, or `flat` when all selected counts are equal.
    Scaled {
        floor: f64,
        span: f64,
        exponent: f64,
        flat: f64,
    },
    /// `start + (offset mod period) * step`, independent of the count.
    Cycled { start: f64, step: f64, period: usize },
}

struct TierRule {
    base: BaseWeight,
    /// One extra entry per factor, weighted `factor * primary weight`.
    duplicates: &'static [f64],
}

const HIGH: TierRule = TierRule {
    base: BaseWeight::Scaled {
        floor: 40.0,
        span: 80.0,
        exponent: 0.5,
        flat: 80.0,
    },
    duplicates: &[],
};

const MID: TierRule = TierRule {
    base: BaseWeight::Scaled {
        floor: 25.0,
        span: 35.0,
        exponent: 0.6,
        flat: 35.0,
    },
    duplicates: &[0.8],
};

const LOW: TierRule = TierRule {
    base: BaseWeight::Cycled {
        start: 15.0,
        step: 2.0,
        period: 3,
    },
    duplicates: &[0.9, 1.0],
};

/// Occurrence counts per distinct term, in first-occurrence order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrequency {
    entries: Vec<(String, u32)>,
}

impl RawFrequency {
    /// Counts every term of `terms`.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<(String, u32)> = Vec::new();
        for term in terms {
            let term = term.as_ref();
            match index.get(term) {
                Some(&i) => entries[i].1 += 1,
                None => {
                    index.insert(term.to_owned(), entries.len());
                    entries.push((term.to_owned(), 1));
                }
            }
        }
        RawFrequency { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, term: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, c)| *c)
    }

    /// Terms sorted by count descending, ties in first-occurrence order, cut at `k`.
    pub fn ranked(&self, k: usize) -> Vec<RankedTerm> {
        let mut sorted: Vec<&(String, u32)> = self.entries.iter().collect();
        // stable: equal counts keep first-occurrence order
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (term, count))| RankedTerm {
                term: term.clone(),
                count: *count,
                rank,
            })
            .collect()
    }
}

/// A selected term with its raw count and 0-based rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTerm {
    pub term: String,
    pub count: u32,
    pub rank: usize,
}

/// One renderer entry.
///
/// `variant_index` 0 is the primary entry of `source_term`; higher indices are
/// layout duplicates of the same term (see the module docs). The pair
/// `(source_term, variant_index)` is the entry's key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedTerm {
    pub source_term: String,
    pub variant_index: usize,
    pub weight: f64,
    pub tier: Tier,
}

impl WeightedTerm {
    pub fn key(&self) -> (&str, usize) {
        (&self.source_term, self.variant_index)
    }

    pub fn is_duplicate(&self) -> bool {
        self.variant_index > 0
    }
}

/// Ordered renderer input: high tier, then mid and low tiers with each
/// term's duplicates right after its primary entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct WeightedTermSet {
    entries: Vec<WeightedTerm>,
}

impl WeightedTermSet {
    pub fn iter(&self) -> std::slice::Iter<'_, WeightedTerm> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, term: &str, variant_index: usize) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.key() == (term, variant_index))
            .map(|e| e.weight)
    }

    /// Primary entries only, one per source term.
    pub fn primaries(&self) -> impl Iterator<Item = &WeightedTerm> {
        self.entries.iter().filter(|e| !e.is_duplicate())
    }

    /// Number of distinct source terms.
    pub fn distinct_terms(&self) -> usize {
        self.primaries().count()
    }
}

impl<'a> IntoIterator for &'a WeightedTermSet {
    type Item = &'a WeightedTerm;
    type IntoIter = std::slice::Iter<'a, WeightedTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Turns a filtered term sequence into a weighted term set.
///
/// Returns `None` when `tokens` is empty. Equal counts across the whole
/// selection take each tier's constant weight. Pure and deterministic.
pub fn normalize<S: AsRef<str>>(tokens: &[S]) -> Option<WeightedTermSet> {
    let freq = RawFrequency::from_terms(tokens);
    normalize_frequency(&freq)
}

/// [`normalize`] over an already aggregated frequency table.
pub fn normalize_frequency(freq: &RawFrequency) -> Option<WeightedTermSet> {
    let ranked = freq.ranked(TOP_K);
    let (first, last) = (ranked.first()?, ranked.last()?);
    let (max_count, min_count) = (first.count, last.count);
    let range = max_count - min_count;

    let mut entries = Vec::with_capacity(ranked.len() * 3);
    for ranked_term in &ranked {
        let tier = Tier::for_rank(ranked_term.rank);
        let rule = tier.rule();
        let offset = ranked_term.rank % TIER_SIZE;

        let base = match rule.base {
            BaseWeight::Scaled {
                floor,
                span,
                exponent,
                flat,
            } => {
                if range > 0 {
                    let norm = f64::from(ranked_term.count - min_count) / f64::from(range);
                    floor + norm.powf(exponent) * span
                } else {
                    flat
                }
            }
            BaseWeight::Cycled {
                start,
                step,
                period,
            } => start + (offset % period) as f64 * step,
        };

        entries.push(WeightedTerm {
            source_term: ranked_term.term.clone(),
            variant_index: 0,
            weight: base,
            tier,
        });

        for (i, factor) in rule.duplicates.iter().enumerate() {
            entries.push(WeightedTerm {
                source_term: ranked_term.term.clone(),
                variant_index: i + 1,
                weight: base * factor,
                tier,
            });
        }
    }

    Some(WeightedTermSet { entries })
}
