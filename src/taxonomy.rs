// src/taxonomy.rs
//! Keyword taxonomies: the closed set of industry track categories, ordered
//! keyword lists per category, and star-investor alias groups.

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Industry sentiment category. Each category carries a fixed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCategory {
    /// Sentiment-driven themes the market chases.
    Hot,
    /// Growth story, moderate attention.
    Growth,
    /// Traditional business with little re-rating potential.
    LowElasticity,
    /// Sectors capital avoids (high break rate, regulatory risk).
    Avoid,
    Neutral,
}

impl TrackCategory {
    pub fn score(self) -> i32 {
        match self {
            TrackCategory::Hot => 2,
            TrackCategory::Growth => 1,
            TrackCategory::Neutral => 0,
            TrackCategory::LowElasticity => -1,
            TrackCategory::Avoid => -2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackCategory::Hot => "热门赛道",
            TrackCategory::Growth => "成长赛道",
            TrackCategory::LowElasticity => "低弹性赛道",
            TrackCategory::Avoid => "回避赛道",
            TrackCategory::Neutral => "中性赛道",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackCategory::Hot => "hot",
            TrackCategory::Growth => "growth",
            TrackCategory::LowElasticity => "low_elasticity",
            TrackCategory::Avoid => "avoid",
            TrackCategory::Neutral => "neutral",
        }
    }
}

/// An ordered keyword list bound to one category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeywordTaxonomy {
    pub category: TrackCategory,
    pub keywords: Vec<String>,
}

impl KeywordTaxonomy {
    pub fn new<S: Into<String>>(category: TrackCategory, keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            category,
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Industry precedence as data: `ranked` lists are tried in order (first
/// match wins), then `overriding` is tried independently and, when it
/// matches, replaces whatever the ranked lists produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryTaxonomy {
    pub ranked: Vec<KeywordTaxonomy>,
    pub overriding: KeywordTaxonomy,
}

impl IndustryTaxonomy {
    pub fn new(ranked: Vec<KeywordTaxonomy>, overriding: KeywordTaxonomy) -> anyhow::Result<Self> {
        for t in &ranked {
            if matches!(t.category, TrackCategory::Neutral | TrackCategory::Avoid) {
                bail!("ranked industry lists cannot use category `{}`", t.category.as_str());
            }
        }
        if overriding.category == TrackCategory::Neutral {
            bail!("overriding industry list cannot be `neutral`");
        }
        Ok(Self { ranked, overriding })
    }
}

/// A star investor: canonical name plus every spelling that counts as a match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvestorGroup {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl InvestorGroup {
    /// Canonical name first, then aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
