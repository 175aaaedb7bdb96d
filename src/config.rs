// src/config.rs
//! Scoring configuration: TOML schema, regex compilation and env overrides.
//!
//! Every keyword list, section recipe and threshold the rules use lives in one
//! TOML document. The built-in copy (`config/scoring.toml`) is embedded at
//! compile time; `IPO_SCORING_CONFIG_PATH` points at a replacement file.
//! All regexes are compiled while loading, so a bad pattern fails the load
//! (naming the list it came from) instead of a scoring run.

use crate::matcher::{ContextWindow, DefinitionListGuard, KeywordMatcher};
use crate::section::{Fallback, SearchPlan, SectionSpec};
use crate::taxonomy::{IndustryTaxonomy, InvestorGroup, KeywordTaxonomy};
use anyhow::{anyhow, bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// --- env defaults & names ---
pub const DEFAULT_MIN_DOCUMENT_CHARS: usize = 5000;

pub const ENV_SCORING_CONFIG_PATH: &str = "IPO_SCORING_CONFIG_PATH";
pub const ENV_MIN_DOCUMENT_CHARS: &str = "IPO_MIN_DOCUMENT_CHARS";

const BUILTIN_TOML: &str = include_str!("../config/scoring.toml");

static BUILTIN: Lazy<ScoringConfig> =
    Lazy::new(|| ScoringConfig::from_toml_str(BUILTIN_TOML).expect("valid built-in scoring config"));

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    engine: RawEngine,
    #[serde(default)]
    evidence: Option<RawEvidence>,
    old_shares: RawOldShares,
    sponsor: RawSponsor,
    cornerstone: RawCornerstone,
    lockup: RawLockup,
    industry: RawIndustry,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEngine {
    #[serde(default = "default_min_document_chars")]
    min_document_chars: usize,
}

fn default_min_document_chars() -> usize {
    DEFAULT_MIN_DOCUMENT_CHARS
}

#[derive(Debug, Clone, Deserialize)]
struct RawEvidence {
    context_before: usize,
    context_after: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSection {
    name: String,
    label: String,
    starts: Vec<String>,
    #[serde(default)]
    ends: Vec<String>,
    max_chars: usize,
    #[serde(default)]
    min_chars: usize,
    #[serde(default = "default_true")]
    skip_toc: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct RawFallback {
    #[serde(default)]
    skip_chars: usize,
    chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOldShares {
    phrases: Vec<String>,
    #[serde(default)]
    boilerplate: Vec<String>,
    #[serde(default)]
    new_share_patterns: Vec<String>,
    #[serde(default)]
    sale_share_patterns: Vec<String>,
    #[serde(default)]
    offering_statement: Option<String>,
    #[serde(default = "default_offering_statement_chars")]
    offering_statement_chars: usize,
    #[serde(default)]
    sections: Vec<RawSection>,
    fallback: RawFallback,
}

fn default_offering_statement_chars() -> usize {
    25_000
}

#[derive(Debug, Clone, Deserialize)]
struct RawSponsor {
    min_deals: u32,
    top_rate: f64,
    weak_rate: f64,
    #[serde(default = "default_short_token_max")]
    short_token_max: usize,
    #[serde(default)]
    definition_markers: Vec<String>,
    #[serde(default = "default_definition_window")]
    definition_window_chars: usize,
    #[serde(default)]
    definition_min_chars: usize,
    #[serde(default)]
    stock_code_patterns: Vec<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
    fallback: RawFallback,
}

fn default_short_token_max() -> usize {
    5
}

fn default_definition_window() -> usize {
    600
}

#[derive(Debug, Clone, Deserialize)]
struct RawCornerstone {
    #[serde(default = "default_short_token_max")]
    short_token_max: usize,
    #[serde(default)]
    trusted_sections: Vec<String>,
    guard: DefinitionListGuard,
    #[serde(default)]
    sections: Vec<RawSection>,
    fallback: RawFallback,
    investors: Vec<InvestorGroup>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLockup {
    pre_ipo: Vec<String>,
    lockup: Vec<String>,
    window_before: usize,
    window_after: usize,
    #[serde(default)]
    sections: Vec<RawSection>,
    fallback: RawFallback,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIndustry {
    #[serde(default = "default_short_token_max")]
    short_token_max: usize,
    guard: DefinitionListGuard,
    #[serde(default)]
    sections: Vec<RawSection>,
    fallback: RawFallback,
    ranked: Vec<KeywordTaxonomy>,
    overriding: KeywordTaxonomy,
}

/* ----------------------------
Compiled configuration
---------------------------- */

/// Old-share rule inputs.
#[derive(Debug, Clone)]
pub struct OldSharesConfig {
    pub plan: SearchPlan,
    pub phrases: Vec<String>,
    /// Sentences that on their own prove sale shares (normalized-text regexes).
    pub boilerplate: Vec<Regex>,
    /// Capture group 1 is the share count.
    pub new_share_patterns: Vec<Regex>,
    pub sale_share_patterns: Vec<Regex>,
    pub offering_statement: Option<Regex>,
    pub offering_statement_chars: usize,
}

/// Score bands for the main sponsor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SponsorThresholds {
    /// Fewer deals than this is "insufficient data", never scored.
    pub min_deals: u32,
    /// Average first-day return (%) at or above which the sponsor scores +2.
    pub top_rate: f64,
    /// Below this the sponsor scores -2.
    pub weak_rate: f64,
}

#[derive(Debug, Clone)]
pub struct SponsorConfig {
    pub plan: SearchPlan,
    pub thresholds: SponsorThresholds,
    pub matcher: KeywordMatcher,
    pub definition_markers: Vec<Regex>,
    pub definition_window_chars: usize,
    pub definition_min_chars: usize,
    /// Capture group 1 is the stock code.
    pub stock_code_patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct CornerstoneConfig {
    pub plan: SearchPlan,
    pub matcher: KeywordMatcher,
    pub trusted_sections: Vec<String>,
    pub guard: DefinitionListGuard,
    pub investors: Vec<InvestorGroup>,
}

#[derive(Debug, Clone)]
pub struct LockupConfig {
    pub plan: SearchPlan,
    pub pre_ipo: Vec<String>,
    pub lockup: Vec<String>,
    pub window_before: usize,
    pub window_after: usize,
}

#[derive(Debug, Clone)]
pub struct IndustryConfig {
    pub plan: SearchPlan,
    pub matcher: KeywordMatcher,
    pub guard: DefinitionListGuard,
    pub taxonomy: IndustryTaxonomy,
}

/// Immutable, fully compiled scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub min_document_chars: usize,
    pub context: ContextWindow,
    pub old_shares: OldSharesConfig,
    pub sponsor: SponsorConfig,
    pub cornerstone: CornerstoneConfig,
    pub lockup: LockupConfig,
    pub industry: IndustryConfig,
}

impl ScoringConfig {
    /// The embedded default configuration.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: RawConfig = toml::from_str(toml_str).context("invalid scoring config TOML")?;

        let context = raw
            .evidence
            .map(|e| ContextWindow {
                before: e.context_before,
                after: e.context_after,
            })
            .unwrap_or_default();

        let o = raw.old_shares;
        let old_shares = OldSharesConfig {
            plan: compile_plan("old_shares", &o.sections, &o.fallback)?,
            phrases: non_empty("old_shares.phrases", o.phrases)?,
            boilerplate: compile_patterns("old_shares.boilerplate", &o.boilerplate)?,
            new_share_patterns: compile_captures("old_shares.new_share_patterns", &o.new_share_patterns)?,
            sale_share_patterns: compile_captures("old_shares.sale_share_patterns", &o.sale_share_patterns)?,
            offering_statement: o
                .offering_statement
                .map(|p| compile_captures("old_shares.offering_statement", &[p]))
                .transpose()?
                .and_then(|mut v| v.pop()),
            offering_statement_chars: o.offering_statement_chars,
        };

        let s = raw.sponsor;
        if s.weak_rate.is_nan() || s.top_rate.is_nan() || s.weak_rate > s.top_rate {
            bail!(
                "sponsor.weak_rate ({}) must not exceed sponsor.top_rate ({})",
                s.weak_rate,
                s.top_rate
            );
        }
        let sponsor = SponsorConfig {
            plan: compile_plan("sponsor", &s.sections, &s.fallback)?,
            thresholds: SponsorThresholds {
                min_deals: s.min_deals,
                top_rate: s.top_rate,
                weak_rate: s.weak_rate,
            },
            matcher: KeywordMatcher::new(s.short_token_max),
            definition_markers: compile_patterns("sponsor.definition_markers", &s.definition_markers)?,
            definition_window_chars: s.definition_window_chars,
            definition_min_chars: s.definition_min_chars,
            stock_code_patterns: compile_captures("sponsor.stock_code_patterns", &s.stock_code_patterns)?,
        };

        let c = raw.cornerstone;
        if c.investors.is_empty() {
            bail!("cornerstone.investors must not be empty");
        }
        let cornerstone = CornerstoneConfig {
            plan: compile_plan("cornerstone", &c.sections, &c.fallback)?,
            matcher: KeywordMatcher::new(c.short_token_max),
            trusted_sections: c.trusted_sections,
            guard: c.guard,
            investors: c.investors,
        };

        let l = raw.lockup;
        let lockup = LockupConfig {
            plan: compile_plan("lockup", &l.sections, &l.fallback)?,
            pre_ipo: non_empty("lockup.pre_ipo", l.pre_ipo)?,
            lockup: non_empty("lockup.lockup", l.lockup)?,
            window_before: l.window_before,
            window_after: l.window_after,
        };

        let i = raw.industry;
        let industry = IndustryConfig {
            plan: compile_plan("industry", &i.sections, &i.fallback)?,
            matcher: KeywordMatcher::new(i.short_token_max),
            guard: i.guard,
            taxonomy: IndustryTaxonomy::new(i.ranked, i.overriding).context("industry taxonomy")?,
        };

        Ok(Self {
            min_document_chars: raw.engine.min_document_chars,
            context,
            old_shares,
            sponsor,
            cornerstone,
            lockup,
            industry,
        })
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read scoring config at {}: {}", path.display(), e))?;
        Self::from_toml_str(&content).with_context(|| format!("scoring config {}", path.display()))
    }

    /// Built-in config, or the file named by `IPO_SCORING_CONFIG_PATH`, with an
    /// optional `IPO_MIN_DOCUMENT_CHARS` override.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_SCORING_CONFIG_PATH)
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(p) => {
                let path = PathBuf::from(p);
                let cfg = Self::from_file(&path)?;
                info!(target: "scoring", path = %path.display(), "loaded scoring config");
                cfg
            }
            None => Self::builtin(),
        };

        let raw_min = std::env::var(ENV_MIN_DOCUMENT_CHARS).ok();
        match parse_min_chars_env(raw_min.as_deref()) {
            Some(n) => cfg.min_document_chars = n,
            None if raw_min.is_some() => warn!(
                target: "scoring",
                value = ?raw_min,
                "ignoring invalid {}", ENV_MIN_DOCUMENT_CHARS
            ),
            None => {}
        }
        Ok(cfg)
    }
}

// parse optional positive integer env
fn parse_min_chars_env(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(what: &str, list: Vec<String>) -> anyhow::Result<Vec<String>> {
    if list.iter().all(|s| s.trim().is_empty()) {
        bail!("`{what}` must list at least one keyword");
    }
    Ok(list.into_iter().filter(|s| !s.trim().is_empty()).collect())
}

fn compile_patterns(what: &str, patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| anyhow!("`{}` regex error in `{}`: {}", what, p, e)))
        .collect()
}

/// Like `compile_patterns`, but every pattern must have a capture group.
fn compile_captures(what: &str, patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    let compiled = compile_patterns(what, patterns)?;
    if let Some(re) = compiled.iter().find(|re| re.captures_len() < 2) {
        bail!("`{}` pattern `{}` needs a capture group", what, re.as_str());
    }
    Ok(compiled)
}

fn compile_plan(rule: &str, sections: &[RawSection], fallback: &RawFallback) -> anyhow::Result<SearchPlan> {
    let sections = sections
        .iter()
        .map(|s| {
            let what = format!("{rule}.sections.{}", s.name);
            if s.starts.is_empty() {
                bail!("`{what}` has no start patterns");
            }
            if s.max_chars == 0 {
                bail!("`{what}` max_chars must be positive");
            }
            Ok(SectionSpec {
                name: s.name.clone(),
                label: s.label.clone(),
                starts: compile_patterns(&format!("{what}.starts"), &s.starts)?,
                ends: compile_patterns(&format!("{what}.ends"), &s.ends)?,
                max_chars: s.max_chars,
                min_chars: s.min_chars,
                skip_toc: s.skip_toc,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if fallback.chars == 0 {
        bail!("`{rule}.fallback.chars` must be positive");
    }
    Ok(SearchPlan {
        sections,
        fallback: Fallback {
            skip_chars: fallback.skip_chars,
            chars: fallback.chars,
        },
    })
}
