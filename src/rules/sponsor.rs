//! Sponsor track-record rule.
//!
//! Identification runs in priority order: the "「保薦人」指 ..." definition,
//! the parties-involved section, then a bounded prefix. Only when no table
//! key matches in the text does the stock-code mapping get consulted, and the
//! evidence records which path produced the answer.

use super::{Document, ReasonCode, RuleKind, RuleResult};
use crate::config::{SponsorConfig, SponsorThresholds};
use crate::evidence::{Evidence, Facts, KeywordHit, MatchedSponsor, SponsorFacts, SponsorSource};
use crate::matcher::{find_hit, ContextWindow};
use crate::normalize::format_stock_code;
use crate::section::{advance_chars, char_len, SearchRange};
use crate::sponsors::{dedup_names, SponsorRecord, SponsorReference};
use std::collections::HashMap;

/// Opening quotes of the next defined term in a glossary.
const TERM_OPENERS: [char; 3] = ['「', '“', '"'];

pub fn evaluate(
    doc: &Document<'_>,
    cfg: &SponsorConfig,
    reference: &SponsorReference,
    window: ContextWindow,
) -> RuleResult {
    let range = definition_range(doc.text(), cfg).unwrap_or_else(|| cfg.plan.resolve(doc.text()));

    let mut candidates: Vec<(&str, &SponsorRecord, KeywordHit)> = reference
        .table
        .entries()
        .filter_map(|(key, rec)| {
            find_hit(&range, key, &cfg.matcher, None, window).map(|hit| (key, rec, hit))
        })
        .collect();
    drop_shadowed_aliases(&mut candidates);

    if !candidates.is_empty() {
        let hits: Vec<KeywordHit> = candidates.iter().map(|(_, _, h)| h.clone()).collect();
        let matched = rank(candidates.iter().map(|(k, r, _)| (*k, *r)));
        let (score, reason, detail, rule) = grade(&matched[0], &cfg.thresholds);
        let facts = SponsorFacts {
            source: SponsorSource::Document,
            stock_code: None,
            matched,
            unrated: Vec::new(),
        };
        let evidence = Evidence::new(range.evidence(), rule, Facts::Sponsor(facts)).with_hits(hits);
        return RuleResult::new(RuleKind::Sponsor, score, reason, detail, evidence);
    }

    // The code printed in the document wins; the caller's code is tried when
    // the printed one has no mapping entry.
    let mut codes: Vec<String> = stock_code_in_text(doc.text(), cfg).into_iter().collect();
    if doc.stock_code() != "00000" && !codes.iter().any(|c| c == doc.stock_code()) {
        codes.push(doc.stock_code().to_string());
    }
    let mapped = codes
        .iter()
        .find_map(|code| reference.by_code.sponsors_for(code).map(|names| (code, names)));
    let stock_code = mapped
        .map(|(code, _)| code.clone())
        .or_else(|| codes.first().cloned());
    let names = mapped
        .map(|(_, names)| dedup_names(names.iter().map(String::as_str)))
        .unwrap_or_default();

    if names.is_empty() {
        let facts = SponsorFacts {
            source: SponsorSource::None,
            stock_code,
            matched: Vec::new(),
            unrated: Vec::new(),
        };
        let evidence = Evidence::new(range.evidence(), "未匹配到保荐人数据库，不评分", Facts::Sponsor(facts));
        return RuleResult::new(RuleKind::Sponsor, 0, ReasonCode::Unidentified, "未识别到保荐人", evidence);
    }

    let mut resolved = Vec::new();
    let mut unrated = Vec::new();
    for name in &names {
        match reference.table.resolve(name) {
            Some((key, rec)) => resolved.push((key, rec)),
            None => unrated.push(name.clone()),
        }
    }

    let (score, reason, detail, rule, matched) = if resolved.is_empty() {
        (
            0,
            ReasonCode::NoTrackRecord,
            format!("保荐人{}无历史业绩数据[备用]", names.join("、")),
            "保荐人无历史业绩数据，不评分".to_string(),
            Vec::new(),
        )
    } else {
        let matched = rank(resolved);
        let (score, reason, detail, rule) = grade(&matched[0], &cfg.thresholds);
        (score, reason, format!("{detail}[备用]"), rule, matched)
    };
    let facts = SponsorFacts {
        source: SponsorSource::StockCodeMapping,
        stock_code,
        matched,
        unrated,
    };
    let evidence = Evidence::new(range.evidence(), rule, Facts::Sponsor(facts));
    RuleResult::new(RuleKind::Sponsor, score, reason, detail, evidence)
}

/// Text after a "the sponsor means" marker, up to the next defined term.
fn definition_range<'a>(text: &'a str, cfg: &SponsorConfig) -> Option<SearchRange<'a>> {
    cfg.definition_markers.iter().find_map(|re| {
        let m = re.find(text)?;
        let cap = advance_chars(text, m.end(), cfg.definition_window_chars);
        let end = text[m.end()..cap]
            .find(|c: char| TERM_OPENERS.contains(&c))
            .map_or(cap, |i| m.end() + i);
        let body = &text[m.end()..end];
        if char_len(body.trim()) < cfg.definition_min_chars {
            return None;
        }
        let mut range = SearchRange::new(body, "sponsor_definition", "保荐人释义");
        range.offset = m.end();
        Some(range)
    })
}

fn stock_code_in_text(text: &str, cfg: &SponsorConfig) -> Option<String> {
    cfg.stock_code_patterns
        .iter()
        .find_map(|re| re.captures(text)?.get(1).map(|m| format_stock_code(m.as_str())))
}

/// A short key contained in a longer matched key with different statistics is
/// part of another sponsor's name ("中信" inside "中信里昂").
fn drop_shadowed_aliases(candidates: &mut Vec<(&str, &SponsorRecord, KeywordHit)>) {
    let shadowed: Vec<bool> = candidates
        .iter()
        .map(|(key, rec, _)| {
            candidates.iter().any(|(other, other_rec, _)| {
                other.len() > key.len()
                    && other.contains(*key)
                    && other_rec.stats_key() != rec.stats_key()
            })
        })
        .collect();
    let mut flags = shadowed.into_iter();
    candidates.retain(|_| !flags.next().unwrap_or(false));
}

/// One entry per entity (identical stats), main sponsor first: most deals,
/// then the longer name.
fn rank<'a>(found: impl IntoIterator<Item = (&'a str, &'a SponsorRecord)>) -> Vec<MatchedSponsor> {
    let mut by_entity: HashMap<(i64, u32), (&str, &SponsorRecord)> = HashMap::new();
    for (key, rec) in found {
        by_entity
            .entry(rec.stats_key())
            .and_modify(|cur| {
                if char_len(key) > char_len(cur.0) {
                    *cur = (key, rec);
                }
            })
            .or_insert((key, rec));
    }

    let mut matched: Vec<MatchedSponsor> = by_entity
        .into_values()
        .map(|(key, rec)| MatchedSponsor {
            name: rec.name.clone(),
            matched_as: key.to_string(),
            avg_first_day_return: rec.avg_first_day_return,
            deal_count: rec.deal_count,
            win_rate: rec.win_rate,
        })
        .collect();
    matched.sort_by(|a, b| {
        b.deal_count
            .cmp(&a.deal_count)
            .then_with(|| char_len(&b.name).cmp(&char_len(&a.name)))
            .then_with(|| a.name.cmp(&b.name))
    });
    matched
}

fn grade(main: &MatchedSponsor, th: &SponsorThresholds) -> (i32, ReasonCode, String, String) {
    let stats = format!(
        "{}：历史{}单，平均首日涨幅{:.1}%",
        main.name, main.deal_count, main.avg_first_day_return
    );
    if main.deal_count < th.min_deals {
        return (
            0,
            ReasonCode::InsufficientData,
            format!("{stats}，数据不足"),
            format!("保荐人历史案例<{}单，数据不足不评分", th.min_deals),
        );
    }
    let detail = match main.win_rate {
        Some(w) => format!("{stats}，胜率{w:.1}%"),
        None => stats,
    };
    let avg = main.avg_first_day_return;
    if avg >= th.top_rate {
        (2, ReasonCode::TopSponsor, detail, format!("历史平均涨幅≥{}%，+2分", th.top_rate))
    } else if avg >= th.weak_rate {
        (
            0,
            ReasonCode::AverageSponsor,
            detail,
            format!("历史平均涨幅{}%-{}%，0分", th.weak_rate, th.top_rate),
        )
    } else {
        (-2, ReasonCode::WeakSponsor, detail, format!("历史平均涨幅<{}%，-2分", th.weak_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::sponsors::{SponsorTable, StockSponsorMap};

    fn reference(records: Vec<SponsorRecord>) -> SponsorReference {
        SponsorReference::new(SponsorTable::from_records(records), StockSponsorMap::default())
    }

    fn run(text: &str, code: &str, reference: &SponsorReference) -> RuleResult {
        let cfg = ScoringConfig::builtin();
        evaluate(&Document::new(text, code), &cfg.sponsor, reference, cfg.context)
    }

    fn facts(r: &RuleResult) -> &SponsorFacts {
        match &r.evidence.facts {
            Facts::Sponsor(f) => f,
            other => panic!("unexpected facts {other:?}"),
        }
    }

    fn parties(body: &str) -> String {
        format!("參與全球發售的各方\n獨家保薦人\n{body}\n公司資料\n")
    }

    #[test]
    fn small_track_record_is_never_scored() {
        let r = reference(vec![SponsorRecord::new("星河融資有限公司", 95.0, 5, 100.0)]);
        let res = run(&parties("星河融資有限公司"), "1", &r);
        assert_eq!(res.score, 0);
        assert_eq!(res.reason, ReasonCode::InsufficientData);
        assert_eq!(facts(&res).source, SponsorSource::Document);
    }

    #[test]
    fn most_experienced_sponsor_is_main() {
        let r = reference(vec![
            SponsorRecord::new("星河融資有限公司", 90.0, 10, 90.0),
            SponsorRecord::new("遠航證券有限公司", 10.0, 40, 45.0),
        ]);
        let res = run(&parties("星河融資有限公司\n遠航證券有限公司"), "1", &r);
        let f = facts(&res);
        assert_eq!(f.matched[0].name, "遠航證券有限公司");
        assert_eq!(f.matched.len(), 2);
        assert_eq!(res.score, -2);
        assert_eq!(res.reason, ReasonCode::WeakSponsor);
    }

    #[test]
    fn tiers_follow_average_return() {
        for (avg, score, reason) in [
            (70.0, 2, ReasonCode::TopSponsor),
            (55.0, 0, ReasonCode::AverageSponsor),
            (40.0, 0, ReasonCode::AverageSponsor),
            (39.9, -2, ReasonCode::WeakSponsor),
        ] {
            let r = reference(vec![SponsorRecord::new("星河融資有限公司", avg, 8, 60.0)]);
            let res = run(&parties("星河融資有限公司"), "1", &r);
            assert_eq!((res.score, res.reason), (score, reason), "avg {avg}");
        }
    }

    #[test]
    fn aliases_of_one_entity_are_deduplicated() {
        let r = reference(vec![
            SponsorRecord::new("星河融資有限公司", 80.0, 20, 80.0).with_aliases(&["星河融資", "星河"])
        ]);
        let res = run(&parties("星河融資有限公司"), "1", &r);
        let f = facts(&res);
        assert_eq!(f.matched.len(), 1);
        assert_eq!(f.matched[0].matched_as, "星河融資有限公司");
        assert_eq!(res.score, 2);
    }

    #[test]
    fn short_alias_inside_other_sponsor_name_is_dropped() {
        let res = run(&parties("中信里昂證券有限公司"), "1", &SponsorReference::builtin());
        let f = facts(&res);
        assert_eq!(f.matched.len(), 1);
        assert_eq!(f.matched[0].name, "中信里昂證券有限公司");
    }

    #[test]
    fn definition_sentence_takes_priority() {
        let r = reference(vec![
            SponsorRecord::new("星河融資有限公司", 80.0, 20, 80.0),
            SponsorRecord::new("遠航證券有限公司", 10.0, 40, 45.0),
        ]);
        let text = format!(
            "釋義\n「聯席保薦人」指 星河融資有限公司，一家根據證券及期貨條例可從事第6類受規管活動的持牌法團\n\
             「公司」指 本公司\n{}",
            parties("遠航證券有限公司")
        );
        let res = run(&text, "1", &r);
        assert_eq!(res.evidence.section.name, "sponsor_definition");
        assert_eq!(facts(&res).matched[0].name, "星河融資有限公司");
        assert_eq!(res.score, 2);
    }

    #[test]
    fn stock_code_mapping_backstops_missing_names() {
        let mut by_code = StockSponsorMap::default();
        by_code.insert("2677", vec!["中信證券(香港)有限公司".into(), "無名融資".into()]);
        let r = SponsorReference::new(SponsorTable::default_seed(), by_code);

        let res = run("股份代號：2677\n本文件並無保薦人名稱", "", &r);
        let f = facts(&res);
        assert_eq!(f.source, SponsorSource::StockCodeMapping);
        assert_eq!(f.stock_code.as_deref(), Some("02677"));
        assert_eq!(f.unrated, ["無名融資"]);
        assert_eq!(res.reason, ReasonCode::AverageSponsor);
        assert!(res.detail.ends_with("[备用]"));
    }

    #[test]
    fn caller_code_is_tried_when_printed_code_is_unmapped() {
        let mut by_code = StockSponsorMap::default();
        by_code.insert("9999", vec!["中信證券(香港)有限公司".into()]);
        let r = SponsorReference::new(SponsorTable::default_seed(), by_code);

        let res = run("股份代號：1234\n本文件並無保薦人名稱", "9999", &r);
        let f = facts(&res);
        assert_eq!(f.source, SponsorSource::StockCodeMapping);
        assert_eq!(f.stock_code.as_deref(), Some("09999"));
        assert_ne!(res.reason, ReasonCode::Unidentified);
        assert!(res.detail.ends_with("[备用]"));
    }

    #[test]
    fn unmapped_codes_report_the_printed_code() {
        let r = SponsorReference::new(SponsorTable::default_seed(), StockSponsorMap::default());
        let res = run("股份代號：1234\n本文件並無保薦人名稱", "9999", &r);
        assert_eq!(res.reason, ReasonCode::Unidentified);
        assert_eq!(facts(&res).stock_code.as_deref(), Some("01234"));
    }

    #[test]
    fn mapping_names_without_data_have_no_track_record() {
        let mut by_code = StockSponsorMap::default();
        by_code.insert("9999", vec!["無名融資".into()]);
        let r = SponsorReference::new(SponsorTable::default_seed(), by_code);
        let res = run("本文件並無保薦人名稱", "9999", &r);
        assert_eq!(res.score, 0);
        assert_eq!(res.reason, ReasonCode::NoTrackRecord);
    }

    #[test]
    fn missing_reference_data_degrades_to_unidentified() {
        let res = run(&parties("中信證券(香港)有限公司"), "2677", &SponsorReference::default());
        assert_eq!(res.score, 0);
        assert_eq!(res.reason, ReasonCode::Unidentified);
        assert_eq!(facts(&res).source, SponsorSource::None);
    }
}
