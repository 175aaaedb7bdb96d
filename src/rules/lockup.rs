//! Pre-IPO lock-up rule. Three outcomes: no pre-IPO investors (0), pre-IPO
//! investors under a lock-up (0), pre-IPO investors with no lock-up found (-2).

use super::{Document, ReasonCode, RuleKind, RuleResult};
use crate::config::LockupConfig;
use crate::evidence::{Evidence, Facts, KeywordHit, LockupFacts, LockupScope};
use crate::matcher::{first_hit, locate_hit, ContextWindow, KeywordMatcher};
use crate::section::{advance_chars, retreat_chars, SearchRange};

pub fn evaluate(doc: &Document<'_>, cfg: &LockupConfig, window: ContextWindow) -> RuleResult {
    let range = cfg.plan.resolve(doc.text());
    let matcher = KeywordMatcher::default().ignoring_case();

    let Some((pre_ipo, pos, keyword)) = cfg
        .pre_ipo
        .iter()
        .find_map(|k| locate_hit(&range, k, &matcher, None, window).map(|(hit, pos)| (hit, pos, k)))
    else {
        let facts = LockupFacts {
            pre_ipo: None,
            lockup: None,
            lockup_scope: None,
        };
        let evidence = Evidence::new(range.evidence(), "无Pre-IPO投资者，0分", Facts::Lockup(facts))
            .with_searched(&cfg.pre_ipo);
        return RuleResult::new(RuleKind::Lockup, 0, ReasonCode::NoPreIpo, "未发现Pre-IPO投资者", evidence);
    };

    // Normalized-only matches have no raw position, so there is no local window.
    let near = pos.and_then(|p| {
        let from = retreat_chars(range.text, p, cfg.window_before);
        let to = advance_chars(range.text, p + keyword.len(), cfg.window_after);
        let mut local = SearchRange::new(&range.text[from..to], range.name.clone(), range.label.clone());
        local.offset = range.offset + from;
        local.origin = range.origin;
        first_hit(&local, &cfg.lockup, &matcher, None, window)
    });
    let (lockup, scope) = match near {
        Some(hit) => (Some(hit), Some(LockupScope::NearPreIpo)),
        None => match first_hit(&range, &cfg.lockup, &matcher, None, window) {
            Some(hit) => (Some(hit), Some(LockupScope::Section)),
            None => (None, None),
        },
    };

    let hits: Vec<KeywordHit> = std::iter::once(pre_ipo.clone()).chain(lockup.clone()).collect();
    let in_place = lockup.is_some();
    let facts = LockupFacts {
        pre_ipo: Some(pre_ipo),
        lockup,
        lockup_scope: scope,
    };
    let (score, reason, detail, rule) = if in_place {
        (
            0,
            ReasonCode::LockupInPlace,
            "有Pre-IPO投资者，且设有禁售期安排",
            "有Pre-IPO投资者且有禁售期，0分（安全）",
        )
    } else {
        (
            -2,
            ReasonCode::NoLockup,
            "警告：有Pre-IPO投资者但未发现禁售期安排",
            "有Pre-IPO但未发现禁售期，-2分（风险）",
        )
    };
    let mut evidence = Evidence::new(range.evidence(), rule, Facts::Lockup(facts)).with_hits(hits);
    if !in_place {
        evidence = evidence.with_searched(&cfg.lockup);
    }
    RuleResult::new(RuleKind::Lockup, score, reason, detail, evidence)
}
