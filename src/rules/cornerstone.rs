//! Star cornerstone investors. Binary: +2 for any star investor, else 0.

use super::{Document, ReasonCode, RuleKind, RuleResult};
use crate::config::CornerstoneConfig;
use crate::evidence::{CornerstoneFacts, Evidence, Facts, KeywordHit};
use crate::matcher::{find_hit, ContextWindow};

pub fn evaluate(doc: &Document<'_>, cfg: &CornerstoneConfig, window: ContextWindow) -> RuleResult {
    let range = cfg.plan.resolve(doc.text());
    let trusted = range.is_section() && cfg.trusted_sections.iter().any(|s| *s == range.name);
    // Untrusted text (summary, fallback prefix) may be a glossary.
    let guard = (!trusted).then_some(&cfg.guard);

    let mut investors = Vec::new();
    let mut hits: Vec<KeywordHit> = Vec::new();
    for group in &cfg.investors {
        if let Some(hit) = group
            .names()
            .find_map(|name| find_hit(&range, name, &cfg.matcher, guard, window))
        {
            investors.push(group.canonical.clone());
            hits.push(hit);
        }
    }

    let facts = CornerstoneFacts {
        investors: investors.clone(),
        trusted_section: trusted,
    };
    if investors.is_empty() {
        let searched: Vec<&str> = cfg.investors.iter().map(|g| g.canonical.as_str()).collect();
        let evidence = Evidence::new(range.evidence(), "未匹配到明星基石名单，0分", Facts::Cornerstone(facts))
            .with_searched(&searched);
        return RuleResult::new(RuleKind::Cornerstone, 0, ReasonCode::NoStarCornerstone, "无明星基石", evidence);
    }

    let detail = format!("有明星基石: {}", investors.join("、"));
    let evidence = Evidence::new(range.evidence(), "发现明星基石投资者，+2分", Facts::Cornerstone(facts)).with_hits(hits);
    RuleResult::new(RuleKind::Cornerstone, 2, ReasonCode::StarCornerstone, detail, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::evidence::RangeOrigin;

    fn run(text: &str) -> RuleResult {
        let cfg = ScoringConfig::builtin();
        evaluate(&Document::new(text, "1"), &cfg.cornerstone, cfg.context)
    }

    fn cornerstone_section(body: &str) -> String {
        let filler = "基石投資者已同意按發售價認購可購買的發售股份數目。".repeat(25);
        format!("基石投資者\n{body}\n{filler}\n風險因素\n")
    }

    fn facts(r: &RuleResult) -> &CornerstoneFacts {
        match &r.evidence.facts {
            Facts::Cornerstone(f) => f,
            other => panic!("unexpected facts {other:?}"),
        }
    }

    #[test]
    fn single_star_investor_scores_two() {
        let r = run(&cornerstone_section("高瓴資本管理有限公司"));
        assert_eq!(r.score, 2);
        assert_eq!(r.reason, ReasonCode::StarCornerstone);
        assert!(facts(&r).trusted_section);
    }

    #[test]
    fn many_star_investors_still_score_two() {
        let r = run(&cornerstone_section("高瓴、淡馬錫、GIC Private Limited、Sequoia Capital"));
        assert_eq!(r.score, 2);
        assert_eq!(facts(&r).investors, ["高瓴", "红杉", "淡马锡", "GIC"]);
    }

    #[test]
    fn aliases_collapse_to_canonical_name() {
        let r = run(&cornerstone_section("Hillhouse Investment 及 高瓴"));
        assert_eq!(facts(&r).investors, ["高瓴"]);
        assert_eq!(r.evidence.hits.len(), 1);
    }

    #[test]
    fn none_found_is_zero_with_search_list() {
        let r = run(&cornerstone_section("某某投資有限公司"));
        assert_eq!(r.score, 0);
        assert_eq!(r.reason, ReasonCode::NoStarCornerstone);
        assert!(r.evidence.searched.iter().any(|s| s == "高瓴"));
    }

    #[test]
    fn short_section_is_not_trusted_and_glossary_is_rejected() {
        // Too short to count as the cornerstone section: falls back and guards.
        let text = "目錄\n基石投資者\n\n釋義\nADIA CIC DST GIC PIF QIA SSE HKEX CDH\n";
        let r = run(text);
        assert_eq!(r.evidence.section.origin, RangeOrigin::Fallback);
        assert!(!facts(&r).trusted_section);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn embedded_ticker_does_not_match() {
        let r = run(&cornerstone_section("AGIC Capital 及 CICC"));
        assert_eq!(r.score, 0);
    }
}
