// src/rules/mod.rs
//! The five scoring rules and the result type they share.
//!
//! Every rule is a total function of the document, its own compiled config and
//! (for sponsors) the reference data. Rules never fail: a missing section means
//! a fallback range, a missing keyword means an explicit "not found" reason.

pub mod cornerstone;
pub mod industry;
pub mod lockup;
pub mod old_shares;
pub mod sponsor;

use crate::evidence::{Evidence, RangeOrigin};
use crate::normalize::{format_stock_code, normalize};
use crate::taxonomy::TrackCategory;
use once_cell::unsync::OnceCell;
use serde::Serialize;

/// Which rule produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    OldShares,
    Sponsor,
    Cornerstone,
    Lockup,
    Industry,
}

impl RuleKind {
    /// Report order.
    pub const ALL: [RuleKind; 5] = [
        RuleKind::OldShares,
        RuleKind::Sponsor,
        RuleKind::Cornerstone,
        RuleKind::Lockup,
        RuleKind::Industry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::OldShares => "old_shares",
            RuleKind::Sponsor => "sponsor",
            RuleKind::Cornerstone => "cornerstone",
            RuleKind::Lockup => "lockup",
            RuleKind::Industry => "industry",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RuleKind::OldShares => "旧股",
            RuleKind::Sponsor => "保荐人",
            RuleKind::Cornerstone => "基石",
            RuleKind::Lockup => "禁售期",
            RuleKind::Industry => "行业",
        }
    }
}

/// Short, closed reason codes. "Not found" outcomes have their own codes so
/// they are never confused with "matched but neutral".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    HasOldShares,
    AllNewShares,
    TopSponsor,
    AverageSponsor,
    WeakSponsor,
    InsufficientData,
    NoTrackRecord,
    Unidentified,
    StarCornerstone,
    NoStarCornerstone,
    NoPreIpo,
    LockupInPlace,
    NoLockup,
    HotTrack,
    GrowthTrack,
    LowElasticityTrack,
    AvoidTrack,
    Neutral,
}

impl ReasonCode {
    pub fn label(self) -> &'static str {
        match self {
            ReasonCode::HasOldShares => "有旧股发售",
            ReasonCode::AllNewShares => "全部新股",
            ReasonCode::TopSponsor => "优质保荐人",
            ReasonCode::AverageSponsor => "中等保荐人",
            ReasonCode::WeakSponsor => "低质保荐人",
            ReasonCode::InsufficientData => "数据不足",
            ReasonCode::NoTrackRecord => "无业绩记录",
            ReasonCode::Unidentified => "未识别",
            ReasonCode::StarCornerstone => "有明星基石",
            ReasonCode::NoStarCornerstone => "无明星基石",
            ReasonCode::NoPreIpo => "无Pre-IPO",
            ReasonCode::LockupInPlace => "Pre-IPO有禁售期",
            ReasonCode::NoLockup => "Pre-IPO无禁售期",
            ReasonCode::HotTrack => "热门赛道",
            ReasonCode::GrowthTrack => "成长赛道",
            ReasonCode::LowElasticityTrack => "低弹性赛道",
            ReasonCode::AvoidTrack => "资金回避",
            ReasonCode::Neutral => "中性赛道",
        }
    }

    pub fn from_track(track: TrackCategory) -> Self {
        match track {
            TrackCategory::Hot => ReasonCode::HotTrack,
            TrackCategory::Growth => ReasonCode::GrowthTrack,
            TrackCategory::LowElasticity => ReasonCode::LowElasticityTrack,
            TrackCategory::Avoid => ReasonCode::AvoidTrack,
            TrackCategory::Neutral => ReasonCode::Neutral,
        }
    }
}

/// One rule's verdict. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule: RuleKind,
    pub score: i32,
    pub reason: ReasonCode,
    /// Human-readable explanation.
    pub detail: String,
    pub evidence: Evidence,
}

impl RuleResult {
    pub fn new(
        rule: RuleKind,
        score: i32,
        reason: ReasonCode,
        detail: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        Self {
            rule,
            score,
            reason,
            detail: detail.into(),
            evidence,
        }
    }

    /// True when no section was located and the bounded fallback was searched.
    pub fn used_fallback(&self) -> bool {
        self.evidence.section.origin == RangeOrigin::Fallback
    }
}

/// A prospectus as the rules see it: the raw text, the caller's stock code and
/// a lazily built normalized copy.
#[derive(Debug)]
pub struct Document<'a> {
    text: &'a str,
    stock_code: String,
    normalized: OnceCell<String>,
}

impl<'a> Document<'a> {
    pub fn new(text: &'a str, stock_code: &str) -> Self {
        Self {
            text,
            stock_code: format_stock_code(stock_code),
            normalized: OnceCell::new(),
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// 5-digit stock code.
    pub fn stock_code(&self) -> &str {
        &self.stock_code
    }

    pub fn normalized(&self) -> &str {
        self.normalized.get_or_init(|| normalize(self.text))
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_serialize_snake_case() {
        let v = serde_json::to_value(ReasonCode::LowElasticityTrack).unwrap();
        assert_eq!(v, serde_json::json!("low_elasticity_track"));
        assert_eq!(ReasonCode::Unidentified.label(), "未识别");
    }

    #[test]
    fn track_maps_to_reason() {
        assert_eq!(ReasonCode::from_track(TrackCategory::Avoid), ReasonCode::AvoidTrack);
        assert_eq!(ReasonCode::from_track(TrackCategory::Neutral), ReasonCode::Neutral);
    }

    #[test]
    fn document_pads_code_and_normalizes_lazily() {
        let doc = Document::new("中國 證券", "2677");
        assert_eq!(doc.stock_code(), "02677");
        assert_eq!(doc.normalized(), "中国证券");
        assert_eq!(doc.char_count(), 5);
    }
}
