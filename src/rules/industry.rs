//! Industry sentiment.
//!
//! Ranked lists (hot, growth, low-elasticity) are tried in order and the first
//! category with a hit wins. The avoid list is then checked on the same range
//! and, when it hits, replaces the ranked result.

use super::{Document, ReasonCode, RuleKind, RuleResult};
use crate::config::IndustryConfig;
use crate::evidence::{Evidence, Facts, IndustryFacts, KeywordHit};
use crate::matcher::{first_hit, ContextWindow};
use crate::taxonomy::{KeywordTaxonomy, TrackCategory};

pub fn evaluate(doc: &Document<'_>, cfg: &IndustryConfig, window: ContextWindow) -> RuleResult {
    let range = cfg.plan.resolve(doc.text());
    let probe = |t: &KeywordTaxonomy| first_hit(&range, &t.keywords, &cfg.matcher, Some(&cfg.guard), window);

    let ranked: Option<(TrackCategory, KeywordHit)> = cfg
        .taxonomy
        .ranked
        .iter()
        .find_map(|t| probe(t).map(|hit| (t.category, hit)));
    let avoid = probe(&cfg.taxonomy.overriding);

    let (track, hit, overridden) = match (avoid, ranked) {
        (Some(hit), ranked) => (cfg.taxonomy.overriding.category, Some(hit), ranked.map(|(_, h)| h)),
        (None, Some((category, hit))) => (category, Some(hit), None),
        (None, None) => (TrackCategory::Neutral, None, None),
    };

    let score = track.score();
    let (detail, rule) = match &hit {
        Some(h) => (
            format!("{}: {}", describe(track), h.keyword),
            format!("{}，{:+}分", track.label(), score),
        ),
        None => ("无明显偏好".to_string(), "未匹配到行业关键词，0分".to_string()),
    };

    let facts = IndustryFacts { track, overridden };
    let mut evidence = Evidence::new(range.evidence(), rule, Facts::Industry(facts));
    match hit {
        Some(h) => evidence = evidence.with_hit(h),
        None => {
            let all: Vec<&str> = cfg
                .taxonomy
                .ranked
                .iter()
                .chain(std::iter::once(&cfg.taxonomy.overriding))
                .flat_map(|t| t.keywords.iter().map(String::as_str))
                .collect();
            evidence = evidence.with_searched(&all);
        }
    }
    RuleResult::new(RuleKind::Industry, score, ReasonCode::from_track(track), detail, evidence)
}

fn describe(track: TrackCategory) -> &'static str {
    match track {
        TrackCategory::Hot => "情绪驱动型",
        TrackCategory::Growth => "成长叙事型",
        TrackCategory::LowElasticity => "缺乏想象空间",
        TrackCategory::Avoid => "高破发风险",
        TrackCategory::Neutral => "无明显偏好",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::evidence::RangeOrigin;

    fn run(text: &str) -> RuleResult {
        let cfg = ScoringConfig::builtin();
        evaluate(&Document::new(text, "1"), &cfg.industry, cfg.context)
    }

    fn overview(body: &str) -> String {
        format!("行業概覽\n{body}\n監管概覽\n")
    }

    #[test]
    fn avoid_overrides_hot() {
        let r = run(&overview("本集團從事半導體業務，並提供物業管理服務。"));
        assert_eq!(r.score, -2);
        assert_eq!(r.reason, ReasonCode::AvoidTrack);
        match &r.evidence.facts {
            Facts::Industry(f) => {
                assert_eq!(f.track, TrackCategory::Avoid);
                assert_eq!(f.overridden.as_ref().unwrap().keyword, "半導體");
            }
            other => panic!("unexpected facts {other:?}"),
        }
    }

    #[test]
    fn first_ranked_category_wins() {
        let r = run(&overview("我們是一家食品企業，正在研發人工智能應用。"));
        assert_eq!(r.score, 2);
        assert_eq!(r.reason, ReasonCode::HotTrack);
        assert_eq!(r.detail, "情绪驱动型: 人工智能");
    }

    #[test]
    fn growth_and_low_elasticity() {
        assert_eq!(run(&overview("本集團為領先的醫療器械製造商。")).score, 1);
        assert_eq!(run(&overview("本集團主要經營預製菜生產。")).score, -1);
    }

    #[test]
    fn nothing_matched_is_neutral() {
        let r = run(&overview("本集團提供一般顧問服務。"));
        assert_eq!(r.score, 0);
        assert_eq!(r.reason, ReasonCode::Neutral);
        assert_eq!(r.detail, "无明显偏好");
        assert!(r.evidence.searched.iter().any(|k| k == "物業管理"));
    }

    #[test]
    fn glossary_abbreviations_are_ignored() {
        let text = "釋義\nAI CPU DRAM GPU HBM NPU SSD SoC ADC FPGA\n本文件其他內容為一般資料。";
        let r = run(text);
        assert_eq!(r.evidence.section.origin, RangeOrigin::Fallback);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn embedded_short_token_is_ignored() {
        let r = run(&overview("型號L330TOPSPCB模組"));
        assert_eq!(r.score, 0);
    }
}
