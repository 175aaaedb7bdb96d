//! # Score report
//! Pure aggregation of rule results: unweighted sum plus a fixed tier ladder.

use crate::rules::{RuleKind, RuleResult};
use serde::Serialize;

/// Recommendation tier. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    StronglyRecommended,
    Recommended,
    WorthConsidering,
    Cautious,
    NotRecommended,
}

impl Tier {
    pub fn from_total(total: i32) -> Self {
        match total {
            t if t >= 6 => Tier::StronglyRecommended,
            t if t >= 4 => Tier::Recommended,
            t if t >= 2 => Tier::WorthConsidering,
            t if t >= 0 => Tier::Cautious,
            _ => Tier::NotRecommended,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::StronglyRecommended => "强烈推荐",
            Tier::Recommended => "建议申购",
            Tier::WorthConsidering => "可以考虑",
            Tier::Cautious => "谨慎申购",
            Tier::NotRecommended => "不建议",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::StronglyRecommended => "strongly_recommended",
            Tier::Recommended => "recommended",
            Tier::WorthConsidering => "worth_considering",
            Tier::Cautious => "cautious",
            Tier::NotRecommended => "not_recommended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub stock_code: String,
    pub results: Vec<RuleResult>,
    pub total: i32,
    pub tier: Tier,
    pub tier_label: &'static str,
}

impl ScoreReport {
    pub fn aggregate(stock_code: impl Into<String>, results: Vec<RuleResult>) -> Self {
        let total = results.iter().map(|r| r.score).sum();
        let tier = Tier::from_total(total);
        Self {
            stock_code: stock_code.into(),
            results,
            total,
            tier,
            tier_label: tier.label(),
        }
    }

    pub fn result(&self, rule: RuleKind) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule == rule)
    }

    /// Rules that had to search their fallback window.
    pub fn fallback_rules(&self) -> impl Iterator<Item = RuleKind> + '_ {
        self.results.iter().filter(|r| r.used_fallback()).map(|r| r.rule)
    }
}
