//! Audit trail attached to every rule result.
//!
//! Each rule records where its search text came from (a located section or the
//! bounded fallback), which keywords matched and the surrounding text window, so
//! a reviewer can check the score against the prospectus itself.

use serde::Serialize;

/// Whether a search range came from a located section or from the fallback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeOrigin {
    Section,
    Fallback,
}

/// Which part of the document supplied a rule's search text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEvidence {
    pub origin: RangeOrigin,
    /// Stable id of the section recipe ("fallback" for the fallback window).
    pub name: String,
    pub label: String,
    /// Length of the searched range, in characters.
    pub chars: usize,
}

/// One accepted keyword match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordHit {
    /// The keyword as configured.
    pub keyword: String,
    /// Whitespace-collapsed text window around the match.
    pub context: String,
    /// True when the match was only found after normalization.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub normalized: bool,
}

/// Evidence bundle carried by a `RuleResult`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub section: SectionEvidence,
    /// Accepted matches, in the order they were found.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hits: Vec<KeywordHit>,
    /// Keywords that were searched without success (only kept on "not found").
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub searched: Vec<String>,
    /// The scoring rule that applied, in words.
    pub score_rule: String,
    /// Rule-specific facts.
    pub facts: Facts,
}

impl Evidence {
    pub fn new(section: SectionEvidence, score_rule: impl Into<String>, facts: Facts) -> Self {
        Self {
            section,
            hits: Vec::new(),
            searched: Vec::new(),
            score_rule: score_rule.into(),
            facts,
        }
    }

    pub fn with_hit(mut self, hit: KeywordHit) -> Self {
        self.hits.push(hit);
        self
    }

    pub fn with_hits(mut self, hits: impl IntoIterator<Item = KeywordHit>) -> Self {
        self.hits.extend(hits);
        self
    }

    pub fn with_searched<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.searched = keywords.iter().map(|k| k.as_ref().to_string()).collect();
        self
    }

    /// First accepted match, if any.
    pub fn primary_hit(&self) -> Option<&KeywordHit> {
        self.hits.first()
    }
}

/// Rule-specific evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Facts {
    OldShares(OldShareFacts),
    Sponsor(SponsorFacts),
    Cornerstone(CornerstoneFacts),
    Lockup(LockupFacts),
    Industry(IndustryFacts),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OldShareFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_shares: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_shares: Option<u64>,
    /// Sale shares as a percentage of all offer shares.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_ratio_pct: Option<f64>,
    /// The "no proceeds from the selling shareholder" sentence, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boilerplate: Option<String>,
    /// Cover-page line stating the number of offer shares.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offering_statement: Option<String>,
}

/// Which identification path produced the sponsor answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorSource {
    /// Sponsor names matched in the prospectus text.
    Document,
    /// Names came from the external stock-code → sponsor mapping.
    StockCodeMapping,
    /// Neither path produced anything.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedSponsor {
    pub name: String,
    /// Reference-table key that matched (alias or full name).
    pub matched_as: String,
    pub avg_first_day_return: f64,
    pub deal_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SponsorFacts {
    pub source: SponsorSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<String>,
    /// Deduplicated matches, main sponsor first.
    pub matched: Vec<MatchedSponsor>,
    /// Names from the stock-code mapping that had no reference data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CornerstoneFacts {
    /// Canonical investor names (deduplicated aliases).
    pub investors: Vec<String>,
    /// True when the matches came from a genuine cornerstone section.
    pub trusted_section: bool,
}

/// Where the lock-up phrase was found relative to the pre-IPO phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockupScope {
    NearPreIpo,
    Section,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockupFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_ipo: Option<KeywordHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockup: Option<KeywordHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockup_scope: Option<LockupScope>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryFacts {
    pub track: crate::taxonomy::TrackCategory,
    /// The ranked-tier match that the avoid tier overrode, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridden: Option<KeywordHit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_compactly() {
        let ev = Evidence::new(
            SectionEvidence {
                origin: RangeOrigin::Fallback,
                name: "fallback".into(),
                label: "招股书前80000字".into(),
                chars: 80_000,
            },
            "未发现旧股相关关键词",
            Facts::OldShares(OldShareFacts::default()),
        )
        .with_searched(&["銷售股份", "舊股"]);

        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["section"]["origin"], json!("fallback"));
        assert_eq!(v["facts"]["kind"], json!("old_shares"));
        assert!(v.get("hits").is_none());
        assert_eq!(v["searched"], json!(["銷售股份", "舊股"]));
        assert!(v["facts"].get("sale_ratio_pct").is_none());
    }
}
