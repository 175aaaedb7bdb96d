//! # Scoring Engine
//! Runs the five rules over one prospectus and aggregates the result.
//!
//! Scoring is a pure function of (text, stock code, reference data): no I/O and
//! no shared mutable state, so independent documents can be scored in
//! parallel. Reference data is read once per batch from a `ReferenceHandle`.

use crate::config::ScoringConfig;
use crate::error::ScoreError;
use crate::report::ScoreReport;
use crate::rules::{cornerstone, industry, lockup, old_shares, sponsor, Document, RuleResult};
use crate::sponsors::{ReferenceHandle, SponsorReference};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ipo_scoring_runs_total", "Prospectuses scored, by tier.");
        describe_counter!(
            "ipo_scoring_rejected_total",
            "Documents refused as too short to score."
        );
        describe_histogram!("ipo_scoring_total_score", "Total score per scored prospectus.");
        describe_counter!(
            "ipo_rule_fallback_total",
            "Rule runs that searched the fallback window instead of a section."
        );
    });
}

/// Short, non-reversible document id for logs. Raw text is never logged.
pub(crate) fn doc_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: Arc<ScoringConfig>,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Engine over the built-in configuration.
    pub fn builtin() -> Self {
        Self::new(ScoringConfig::builtin())
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        Ok(Self::new(ScoringConfig::from_toml_str(toml_str)?))
    }

    /// Configuration from `IPO_SCORING_CONFIG_PATH` / `IPO_MIN_DOCUMENT_CHARS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(ScoringConfig::from_env()?))
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one prospectus.
    ///
    /// Fails only when the text is shorter than `min_document_chars`, which is
    /// how an unreadable scanned image shows up; an all-zero report would be
    /// misleading there.
    pub fn score(
        &self,
        text: &str,
        stock_code: &str,
        reference: &SponsorReference,
    ) -> Result<ScoreReport, ScoreError> {
        ensure_metrics_described();
        let cfg = &*self.config;
        let doc = Document::new(text, stock_code);
        let id = doc_id(text);

        let chars = doc.char_count();
        if chars < cfg.min_document_chars {
            warn!(
                target: "scoring",
                doc_id = %id,
                stock_code = doc.stock_code(),
                chars,
                min_chars = cfg.min_document_chars,
                "document too short to score"
            );
            counter!("ipo_scoring_rejected_total").increment(1);
            return Err(ScoreError::DocumentTooShort {
                chars,
                min_chars: cfg.min_document_chars,
            });
        }

        let window = cfg.context;
        let results = vec![
            old_shares::evaluate(&doc, &cfg.old_shares, window),
            sponsor::evaluate(&doc, &cfg.sponsor, reference, window),
            cornerstone::evaluate(&doc, &cfg.cornerstone, window),
            lockup::evaluate(&doc, &cfg.lockup, window),
            industry::evaluate(&doc, &cfg.industry, window),
        ];
        for r in &results {
            log_rule(&id, r);
        }

        let report = ScoreReport::aggregate(doc.stock_code(), results);
        info!(
            target: "scoring",
            doc_id = %id,
            stock_code = %report.stock_code,
            chars,
            total = report.total,
            tier = report.tier.as_str(),
            fallbacks = ?report.fallback_rules().collect::<Vec<_>>(),
            "prospectus scored"
        );
        counter!("ipo_scoring_runs_total", "tier" => report.tier.as_str()).increment(1);
        histogram!("ipo_scoring_total_score").record(report.total as f64);
        Ok(report)
    }

    /// Score independent documents `(stock_code, text)` in parallel against a
    /// single snapshot of the reference data. Output order matches input order.
    pub fn score_batch(
        &self,
        docs: &[(String, String)],
        reference: &ReferenceHandle,
    ) -> Vec<Result<ScoreReport, ScoreError>> {
        let snapshot = reference.snapshot();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(docs.len().max(1));
        let chunk = docs.len().div_ceil(workers).max(1);

        std::thread::scope(|s| {
            let handles: Vec<_> = docs
                .chunks(chunk)
                .map(|part| {
                    let snapshot = &snapshot;
                    s.spawn(move || {
                        part.iter()
                            .map(|(code, text)| self.score(text, code, snapshot))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(part) => part,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

fn log_rule(id: &str, r: &RuleResult) {
    debug!(
        target: "scoring",
        doc_id = %id,
        rule = r.rule.as_str(),
        score = r.score,
        reason = ?r.reason,
        section = %r.evidence.section.label,
        "rule evaluated"
    );
    if r.used_fallback() {
        counter!("ipo_rule_fallback_total", "rule" => r.rule.as_str()).increment(1);
    }
}
