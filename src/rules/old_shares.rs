//! Old-share (sale share) detection. Strictly binary: -2 or 0.
//!
//! Sale-share phrases are searched in the offering-structure section (or its
//! fallbacks). The "company will not receive proceeds from the selling
//! shareholder" boilerplate is checked against the whole normalized document
//! and is sufficient on its own.

use super::{Document, ReasonCode, RuleKind, RuleResult};
use crate::config::OldSharesConfig;
use crate::evidence::{Evidence, Facts, KeywordHit, OldShareFacts};
use crate::matcher::{collapse_whitespace, first_hit, ContextWindow, KeywordMatcher};
use crate::section::advance_chars;
use regex::Regex;

pub fn evaluate(doc: &Document<'_>, cfg: &OldSharesConfig, window: ContextWindow) -> RuleResult {
    let range = cfg.plan.resolve(doc.text());
    let matcher = KeywordMatcher::default();

    let statement = offering_statement(doc.text(), cfg);
    let hit = first_hit(&range, &cfg.phrases, &matcher, None, window).or_else(|| {
        let line = statement.as_deref()?;
        cfg.phrases
            .iter()
            .find(|p| matcher.matches(line, p))
            .map(|p| KeywordHit {
                keyword: p.clone(),
                context: line.to_string(),
                normalized: false,
            })
    });
    let boilerplate = cfg
        .boilerplate
        .iter()
        .find_map(|re| re.find(doc.normalized()).map(|m| m.as_str().to_string()));

    let search_in = |patterns: &[Regex]| {
        first_count(patterns, range.text).or_else(|| first_count(patterns, statement.as_deref()?))
    };
    let new_shares = search_in(&cfg.new_share_patterns);
    let sale_shares = search_in(&cfg.sale_share_patterns);
    let sale_ratio_pct = sale_ratio(new_shares, sale_shares);

    let has_old_shares = hit.is_some() || boilerplate.is_some();
    let facts = OldShareFacts {
        new_shares,
        sale_shares,
        sale_ratio_pct,
        boilerplate,
        offering_statement: statement,
    };

    let (score, reason, detail, rule) = if has_old_shares {
        let detail = match sale_ratio_pct {
            Some(pct) => format!("存在销售股份，旧股占发售股份{pct:.1}%，原始股东套现"),
            None => "存在销售股份/旧股，原始股东套现".to_string(),
        };
        (-2, ReasonCode::HasOldShares, detail, "发现旧股发售，-2分")
    } else {
        (
            0,
            ReasonCode::AllNewShares,
            "无旧股发售，募资全部进入公司".to_string(),
            "未发现旧股相关关键词，0分",
        )
    };

    let mut evidence = Evidence::new(range.evidence(), rule, Facts::OldShares(facts));
    match hit {
        Some(h) => evidence = evidence.with_hit(h),
        None if !has_old_shares => evidence = evidence.with_searched(&cfg.phrases),
        None => {}
    }
    RuleResult::new(RuleKind::OldShares, score, reason, detail, evidence)
}

/// The cover-page "number of offer shares" line, whitespace-collapsed.
fn offering_statement(text: &str, cfg: &OldSharesConfig) -> Option<String> {
    let re = cfg.offering_statement.as_ref()?;
    let head = &text[..advance_chars(text, 0, cfg.offering_statement_chars)];
    let caps = re.captures(head)?;
    let line = collapse_whitespace(caps.get(0)?.as_str());
    (!line.is_empty()).then_some(line)
}

fn first_count(patterns: &[Regex], text: &str) -> Option<u64> {
    patterns
        .iter()
        .filter_map(|re| re.captures(text))
        .find_map(|caps| parse_count(caps.get(1)?.as_str()))
}

fn parse_count(s: &str) -> Option<u64> {
    let digits: String = s.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

/// Sale shares as a percentage of all offer shares.
fn sale_ratio(new_shares: Option<u64>, sale_shares: Option<u64>) -> Option<f64> {
    let sale = sale_shares?;
    let total = new_shares.unwrap_or(0).checked_add(sale)?;
    (total > 0).then(|| sale as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::evidence::RangeOrigin;

    fn run(text: &str) -> RuleResult {
        let cfg = ScoringConfig::builtin();
        evaluate(&Document::new(text, "1"), &cfg.old_shares, cfg.context)
    }

    fn facts(r: &RuleResult) -> &OldShareFacts {
        match &r.evidence.facts {
            Facts::OldShares(f) => f,
            other => panic!("unexpected facts {other:?}"),
        }
    }

    #[test]
    fn sale_shares_in_offering_section() {
        let text = "全球發售的架構\n全球發售包括160,000,000股新股份及40,000,000股銷售股份。\n風險因素\n";
        let r = run(text);
        assert_eq!(r.score, -2);
        assert_eq!(r.reason, ReasonCode::HasOldShares);
        assert_eq!(r.evidence.section.name, "global_offering");
        assert_eq!(r.evidence.primary_hit().unwrap().keyword, "銷售股份");
        let f = facts(&r);
        assert_eq!(f.new_shares, Some(160_000_000));
        assert_eq!(f.sale_shares, Some(40_000_000));
        assert!((f.sale_ratio_pct.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn all_new_shares() {
        let text = "全球發售\n本公司提呈200,000,000股新股份以供認購。\n風險因素\n";
        let r = run(text);
        assert_eq!(r.score, 0);
        assert_eq!(r.reason, ReasonCode::AllNewShares);
        assert_eq!(facts(&r).new_shares, Some(200_000_000));
        assert!(facts(&r).sale_ratio_pct.is_none());
        assert!(r.evidence.searched.iter().any(|k| k == "舊股"));
    }

    #[test]
    fn boilerplate_alone_is_sufficient() {
        // The sentence sits outside the located section.
        let text = "全球發售\n本公司提呈新股份。\n風險因素\n\n其他資料\n\
                    本公司將不會收取售股股東出售\n銷售股份的任何所得款項。";
        let r = run(text);
        assert_eq!(r.score, -2);
        assert!(r.evidence.hits.is_empty());
        assert!(facts(&r).boilerplate.is_some());
    }

    #[test]
    fn offering_statement_is_recorded() {
        let text = "封面\n全球發售的發售股份數目：100,000,000股股份（包括80,000,000股新股份\n其他";
        let r = run(text);
        assert_eq!(r.score, 0);
        let f = facts(&r);
        assert!(f.offering_statement.as_deref().unwrap().starts_with("全球發售的發售股份數目"));
        assert_eq!(f.new_shares, Some(80_000_000));
    }

    #[test]
    fn falls_back_to_prefix_without_sections() {
        let r = run("本文件並無章節標題。舊股持有人將出售股份。");
        assert_eq!(r.evidence.section.origin, RangeOrigin::Fallback);
        assert_eq!(r.score, -2);
    }

    #[test]
    fn ratio_math() {
        assert_eq!(sale_ratio(Some(75), Some(25)), Some(25.0));
        assert_eq!(sale_ratio(None, Some(10)), Some(100.0));
        assert_eq!(sale_ratio(Some(10), None), None);
        assert_eq!(sale_ratio(None, Some(0)), None);
        assert_eq!(parse_count("1,234,567"), Some(1_234_567));
        assert_eq!(sale_ratio(Some(u64::MAX), Some(1)), None);
    }

    #[test]
    fn oversized_share_counts_still_score() {
        let text = "全球發售的架構\n全球發售包括18446744073709551615股新股份及1股銷售股份。\n風險因素\n";
        let r = run(text);
        assert_eq!(r.score, -2);
        assert_eq!(r.reason, ReasonCode::HasOldShares);
        assert!(facts(&r).sale_ratio_pct.is_none());
    }
}
