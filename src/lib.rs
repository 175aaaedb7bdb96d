// src/lib.rs
// Public library surface for the demo binary and integration tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod normalize;
pub mod report;
pub mod rules;
pub mod section;
pub mod sponsors;
pub mod taxonomy;

// ---- Re-exports for stable public API ----
pub use crate::config::ScoringConfig;
pub use crate::engine::ScoringEngine;
pub use crate::error::ScoreError;
pub use crate::evidence::{Evidence, Facts, KeywordHit, RangeOrigin, SponsorSource};
pub use crate::matcher::matches;
pub use crate::normalize::{format_stock_code, normalize};
pub use crate::report::{ScoreReport, Tier};
pub use crate::rules::{Document, ReasonCode, RuleKind, RuleResult};
pub use crate::section::extract_section;
pub use crate::sponsors::{ReferenceHandle, SponsorRecord, SponsorReference, SponsorTable, StockSponsorMap};
pub use crate::taxonomy::TrackCategory;
