//! Layout similarity scoring.
//!
//! Rule logic in the engine only sees a score in `[0, 1]`; the algorithm that
//! produces it is chosen through [`LayoutSimilarity`]. Every scorer must be
//! symmetric: `score(a, b) == score(b, a)`.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::model::LayoutSignature;

/// Scores how alike two document layouts are.
pub trait LayoutSimilarity: Send + Sync {
    /// Similarity in `[0, 1]`, where 1 means identical layouts.
    fn score(&self, a: &LayoutSignature, b: &LayoutSignature) -> f64;

    /// Whether both signatures carry the evidence this scorer reads. Pairs
    /// that are not comparable are unknown and raise no layout flag.
    ///
    /// The default requires a fingerprint on both sides.
    fn comparable(&self, a: &LayoutSignature, b: &LayoutSignature) -> bool {
        has_fingerprint(a) && has_fingerprint(b)
    }

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

fn has_fingerprint(sig: &LayoutSignature) -> bool {
    !sig.fingerprint.trim().is_empty()
}

/// Sørensen–Dice coefficient over character bigrams of the fingerprints.
///
/// Whitespace is ignored and comparison is case-insensitive. Short
/// fingerprints that share no bigram score 0 (`"L1"` vs `"L9"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DiceSimilarity;

impl LayoutSimilarity for DiceSimilarity {
    fn score(&self, a: &LayoutSignature, b: &LayoutSignature) -> f64 {
        dice(&a.fingerprint, &b.fingerprint)
    }

    fn name(&self) -> &'static str {
        "dice"
    }
}

/// Normalized Levenshtein similarity of the fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinSimilarity;

impl LayoutSimilarity for LevenshteinSimilarity {
    fn score(&self, a: &LayoutSignature, b: &LayoutSignature) -> f64 {
        strsim::normalized_levenshtein(
            &a.fingerprint.trim().to_lowercase(),
            &b.fingerprint.trim().to_lowercase(),
        )
    }

    fn name(&self) -> &'static str {
        "levenshtein"
    }
}

/// Compares the visual page hashes when both sides have one, otherwise falls
/// back to [`DiceSimilarity`] on the fingerprints. Comparable when both sides
/// have a hash or both have a fingerprint.
#[cfg(feature = "perceptual-hash")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptualSimilarity;

#[cfg(feature = "perceptual-hash")]
impl LayoutSimilarity for PerceptualSimilarity {
    fn score(&self, a: &LayoutSignature, b: &LayoutSignature) -> f64 {
        let visual = a
            .visual_hash
            .as_deref()
            .zip(b.visual_hash.as_deref())
            .and_then(|(ha, hb)| {
                let ha = hex::decode(ha).ok()?;
                let hb = hex::decode(hb).ok()?;
                let bits = (ha.len().max(hb.len()) * 8) as f64;
                crate::layout::hamming_distance(&ha, &hb).map(|d| 1.0 - (d as f64 / bits))
            });

        match visual {
            Some(score) => score.clamp(0.0, 1.0),
            None => dice(&a.fingerprint, &b.fingerprint),
        }
    }

    fn comparable(&self, a: &LayoutSignature, b: &LayoutSignature) -> bool {
        (a.visual_hash.is_some() && b.visual_hash.is_some())
            || (has_fingerprint(a) && has_fingerprint(b))
    }

    fn name(&self) -> &'static str {
        "perceptual"
    }
}

fn dice(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}

/// Scorer selection for configuration files, flags and environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    #[default]
    Dice,
    Levenshtein,
    #[cfg(feature = "perceptual-hash")]
    Perceptual,
}

impl SimilarityKind {
    pub fn scorer(&self) -> Arc<dyn LayoutSimilarity> {
        match self {
            Self::Dice => Arc::new(DiceSimilarity),
            Self::Levenshtein => Arc::new(LevenshteinSimilarity),
            #[cfg(feature = "perceptual-hash")]
            Self::Perceptual => Arc::new(PerceptualSimilarity),
        }
    }
}

impl FromStr for SimilarityKind {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dice" => Ok(Self::Dice),
            "levenshtein" => Ok(Self::Levenshtein),
            #[cfg(feature = "perceptual-hash")]
            "perceptual" => Ok(Self::Perceptual),
            other => Err(SentinelError::InvalidConfig(format!(
                "Unknown similarity scorer '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dice => f.write_str("dice"),
            Self::Levenshtein => f.write_str("levenshtein"),
            #[cfg(feature = "perceptual-hash")]
            Self::Perceptual => f.write_str("perceptual"),
        }
    }
}
