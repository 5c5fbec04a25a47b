//! Expansion thresholds and stop words

use std::collections::BTreeSet;
use std::fmt;

use lazy_static::lazy_static;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// Fail unless `0 < x <= 1`
pub fn assert_fraction(name: &str, x: f64) -> Result<()> {
    if x > 0.0 && x <= 1.0 {
        Ok(())
    } else {
        Err(ProxyError::invalid_argument(format!(
            "{} must be > 0 and <= 1. Invalid value of \"{}\" was provided",
            name, x
        )))
    }
}

/// Render a fraction as an integer percentage, `0.5` -> `"50%"`
pub fn render_percentage(x: f64) -> String {
    format!("{}%", (x * 100.0).round() as i64)
}

/// Thresholds for the more-like-this expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionParams {
    /// Minimum frequency of a term in the seed documents
    pub min_term_freq: u32,

    /// Maximum number of significant terms in the expanded query
    pub max_query_terms: u32,

    /// Terms in fewer than this fraction of matches are noise
    #[serde(alias = "min_doc_freq")]
    pub min_doc_frac: f64,

    /// Terms in more than this fraction of matches are too common
    pub max_doc_frac: f64,

    /// Fraction of significant terms a candidate must match
    #[serde(alias = "minimum_should_match", deserialize_with = "fraction_or_percent")]
    pub min_should_match: f64,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            min_term_freq: 1,
            max_query_terms: 10,
            min_doc_frac: 0.001,
            max_doc_frac: 0.9,
            min_should_match: 0.2,
        }
    }
}

impl ExpansionParams {
    pub fn validate(&self) -> Result<()> {
        assert_fraction("min_should_match", self.min_should_match)?;
        assert_fraction("min_doc_frac", self.min_doc_frac)?;
        assert_fraction("max_doc_frac", self.max_doc_frac)?;
        if self.min_term_freq == 0 {
            return Err(ProxyError::invalid_argument("min_term_freq must be >= 1"));
        }
        if self.max_query_terms == 0 {
            return Err(ProxyError::invalid_argument("max_query_terms must be >= 1"));
        }
        Ok(())
    }

    /// `(min_doc_freq, max_doc_freq)` as absolute counts out of `total`
    pub fn doc_freq_bounds(&self, total: u64) -> (u64, u64) {
        let total = total as f64;
        (
            (self.min_doc_frac * total).floor() as u64,
            (self.max_doc_frac * total).floor() as u64,
        )
    }
}

/// Accepts `0.3`, `"30%"` or `"0.3"`
fn fraction_or_percent<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct FractionVisitor;

    impl<'de> Visitor<'de> for FractionVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a fraction or a percentage string such as \"30%\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<f64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<f64, E> {
            let v = v.trim();
            match v.strip_suffix('%') {
                Some(pct) => pct
                    .trim()
                    .parse::<f64>()
                    .map(|p| p / 100.0)
                    .map_err(E::custom),
                None => v.parse::<f64>().map_err(E::custom),
            }
        }
    }

    deserializer.deserialize_any(FractionVisitor)
}

lazy_static! {
    static ref DEFAULT_STOP_WORDS: BTreeSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "et", "etc", "few", "for", "from", "further", "had", "has", "have",
        "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i",
        "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me", "might", "more",
        "most", "must", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
        "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
        "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
        "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
        "too", "under", "until", "up", "us", "use", "used", "using", "very", "via", "was",
        "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
        "with", "within", "would", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect();
}

/// The built-in stop words plus a caller supplied overlay.
///
/// The built-in list is shared and never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopWords {
    overlay: BTreeSet<String>,
}

impl StopWords {
    pub fn with_overlay<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            overlay: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        DEFAULT_STOP_WORDS.contains(term.as_str()) || self.overlay.contains(&term)
    }

    /// Sorted union of the built-in list and the overlay
    pub fn to_vec(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect();
        all.extend(self.overlay.iter().cloned());
        all.into_iter().collect()
    }
}
