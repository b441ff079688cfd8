use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::bow::{BowVector, Norm, WordValue};
use crate::BowErr;

/// How word weights are computed when building a vocabulary and transforming features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    /// Term frequency: every word weighs 1, occurrences are accumulated.
    Tf,
    /// Inverse document frequency: `ln(N / n_i)` over the training images.
    Idf,
    /// Term frequency times inverse document frequency.
    TfIdf,
    /// Presence of a word, weight 1.
    Binary,
}

/// Similarity measure between two bag of words vectors.
///
/// All but [`Scoring::Kl`] and [`Scoring::DotProduct`] produce a score in `[0, 1]`,
/// where 1 means identical vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    L1,
    L2,
    ChiSquare,
    /// Kullback-Leibler divergence. Lower is more similar.
    Kl,
    Bhattacharyya,
    DotProduct,
}

/// Stand-in for `ln(0)` when a word of one vector is missing in the other.
fn log_eps() -> WordValue {
    WordValue::EPSILON.ln()
}

impl Scoring {
    /// Norm that vectors must be scaled to before scoring, if any.
    pub fn norm(self) -> Option<Norm> {
        match self {
            Scoring::L1 | Scoring::ChiSquare | Scoring::Kl | Scoring::Bhattacharyya => {
                Some(Norm::L1)
            }
            Scoring::L2 => Some(Norm::L2),
            Scoring::DotProduct => None,
        }
    }

    /// Score two vectors that have already been normalized with [`Scoring::norm`].
    pub fn score(self, v: &BowVector, w: &BowVector) -> f64 {
        let mut acc = 0.;
        let mut missing = 0.;
        let mut wi = w.iter().peekable();
        for (id, vv) in v.iter() {
            missing += self.missing_term(vv);
            while wi.peek().map_or(false, |&(wid, _)| wid < id) {
                wi.next();
            }
            if let Some(&(wid, wv)) = wi.peek() {
                if wid == id {
                    acc += self.common_term(vv, wv);
                    wi.next();
                }
            }
        }
        self.finish(acc, missing)
    }

    /// Contribution of a word present in both vectors, relative to its
    /// [`Scoring::missing_term`].
    pub(crate) fn common_term(self, v: WordValue, w: WordValue) -> f64 {
        match self {
            Scoring::L1 => (v - w).abs() - v.abs() - w.abs(),
            Scoring::L2 | Scoring::DotProduct => v * w,
            Scoring::ChiSquare => {
                if v + w != 0. {
                    v * w / (v + w)
                } else {
                    0.
                }
            }
            Scoring::Kl => {
                if v != 0. && w != 0. {
                    v * (v / w).ln() - self.missing_term(v)
                } else {
                    0.
                }
            }
            Scoring::Bhattacharyya => (v * w).sqrt(),
        }
    }

    /// Contribution of a word of the first vector, as if it were missing in the second.
    pub(crate) fn missing_term(self, v: WordValue) -> f64 {
        match self {
            Scoring::Kl if v > 0. => v * (v.ln() - log_eps()),
            _ => 0.,
        }
    }

    pub(crate) fn finish(self, acc: f64, missing: f64) -> f64 {
        match self {
            Scoring::L1 => -acc / 2.,
            Scoring::L2 => {
                if acc >= 1. {
                    1.
                } else {
                    1. - (1. - acc).sqrt()
                }
            }
            Scoring::ChiSquare => 2. * acc,
            Scoring::Kl => acc + missing,
            Scoring::Bhattacharyya | Scoring::DotProduct => acc,
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Weighting::Tf => "tf",
            Weighting::Idf => "idf",
            Weighting::TfIdf => "tf-idf",
            Weighting::Binary => "binary",
        })
    }
}

impl FromStr for Weighting {
    type Err = BowErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tf" => Ok(Weighting::Tf),
            "idf" => Ok(Weighting::Idf),
            "tf-idf" | "tfidf" | "tf_idf" => Ok(Weighting::TfIdf),
            "binary" => Ok(Weighting::Binary),
            _ => Err(BowErr::UnknownWeighting(s.to_string())),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scoring::L1 => "L1-norm",
            Scoring::L2 => "L2-norm",
            Scoring::ChiSquare => "Chi square distance",
            Scoring::Kl => "KL-divergence",
            Scoring::Bhattacharyya => "Bhattacharyya coefficient",
            Scoring::DotProduct => "Dot product",
        })
    }
}

impl FromStr for Scoring {
    type Err = BowErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" | "l1-norm" => Ok(Scoring::L1),
            "l2" | "l2-norm" => Ok(Scoring::L2),
            "chi-square" | "chisquare" | "chi_square" => Ok(Scoring::ChiSquare),
            "kl" => Ok(Scoring::Kl),
            "bhattacharyya" => Ok(Scoring::Bhattacharyya),
            "dot-product" | "dot" => Ok(Scoring::DotProduct),
            _ => Err(BowErr::UnknownScoring(s.to_string())),
        }
    }
}
