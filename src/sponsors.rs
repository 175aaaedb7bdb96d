//! # Sponsor reference data
//!
//! Historical performance of IPO sponsors, keyed by every known spelling of a
//! sponsor's name, plus the stock-code → sponsor mapping used as a backstop when
//! the prospectus text does not name a recognisable sponsor.
//!
//! - `SponsorTable::default_seed()` is the built-in baseline.
//! - The crawler dataset (`data/sponsors.json`) overlays the baseline; on a key
//!   collision the dataset wins.
//! - Missing or unreadable files never fail a scoring run: loaders log a warning
//!   and keep whatever data they have.
//!
//! Reference data is read-only during a batch. `ReferenceHandle` lets a caller
//! swap in refreshed data between batches.

use crate::normalize::{format_stock_code, normalize};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

pub const DEFAULT_SPONSORS_PATH: &str = "data/sponsors.json";
pub const DEFAULT_SPONSOR_MAPPING_PATH: &str = "data/ipo-sponsors.json";

pub const ENV_SPONSORS_PATH: &str = "IPO_SPONSORS_PATH";
pub const ENV_SPONSOR_MAPPING_PATH: &str = "IPO_SPONSOR_MAPPING_PATH";

/// One sponsor entity and its track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorRecord {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Average first-day return, percent (signed).
    pub avg_first_day_return: f64,
    /// Number of past listings sponsored.
    pub deal_count: u32,
    /// Share of past listings that closed day one above the offer price, percent.
    #[serde(default)]
    pub win_rate: Option<f64>,
}

impl SponsorRecord {
    pub fn new(name: &str, avg_first_day_return: f64, deal_count: u32, win_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            avg_first_day_return,
            deal_count,
            win_rate: Some(win_rate),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Entity identity used for deduplication: name variants of one sponsor
    /// carry identical statistics.
    pub fn stats_key(&self) -> (i64, u32) {
        ((self.avg_first_day_return * 100.0).round() as i64, self.deal_count)
    }
}

/// Sponsor lookup table: every name and alias maps to its entity's record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SponsorTable {
    entries: BTreeMap<String, SponsorRecord>,
}

impl SponsorTable {
    pub fn from_records(records: impl IntoIterator<Item = SponsorRecord>) -> Self {
        let mut entries = BTreeMap::new();
        for rec in records {
            for alias in &rec.aliases {
                entries.insert(alias.clone(), rec.clone());
            }
            entries.insert(rec.name.clone(), rec);
        }
        Self { entries }
    }

    /// Overlay `newer` on top of `self`; `newer` wins on key collision.
    pub fn merge(mut self, newer: SponsorTable) -> Self {
        self.entries.extend(newer.entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SponsorRecord> {
        self.entries.get(key)
    }

    /// All (key, record) pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SponsorRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve an externally supplied sponsor name: exact key, then normalized
    /// key, then the longest key that contains or is contained in the name.
    pub fn resolve(&self, name: &str) -> Option<(&str, &SponsorRecord)> {
        if let Some((k, v)) = self.entries.get_key_value(name) {
            return Some((k.as_str(), v));
        }
        let wanted = normalize(name);
        if wanted.chars().count() < 2 {
            return None;
        }
        let mut best: Option<(&str, &SponsorRecord, String)> = None;
        for (k, v) in &self.entries {
            let nk = normalize(k);
            if nk.is_empty() {
                continue;
            }
            let exact = nk == wanted;
            if exact {
                return Some((k.as_str(), v));
            }
            if wanted.contains(&nk) || nk.contains(&wanted) {
                let longer = best.as_ref().map_or(true, |(_, _, b)| nk.len() > b.len());
                if longer {
                    best = Some((k.as_str(), v, nk));
                }
            }
        }
        best.map(|(k, v, _)| (k, v))
    }

    /// Distinct sponsor entities with at least `min_deals` deals, most
    /// experienced first.
    pub fn top(&self, limit: usize, min_deals: u32) -> Vec<&SponsorRecord> {
        let mut by_entity: BTreeMap<(i64, u32), &SponsorRecord> = BTreeMap::new();
        for rec in self.entries.values() {
            if rec.deal_count < min_deals {
                continue;
            }
            by_entity
                .entry(rec.stats_key())
                .and_modify(|cur| {
                    if rec.name.chars().count() > cur.name.chars().count() {
                        *cur = rec;
                    }
                })
                .or_insert(rec);
        }
        let mut out: Vec<&SponsorRecord> = by_entity.into_values().collect();
        out.sort_by(|a, b| b.deal_count.cmp(&a.deal_count).then_with(|| a.name.cmp(&b.name)));
        out.truncate(limit);
        out
    }

    /// Built-in baseline: major Chinese, international and local sponsors with
    /// their traditional, simplified and English short names.
    pub fn default_seed() -> Self {
        let r = SponsorRecord::new;
        Self::from_records([
            // Chinese brokers
            r("中國國際金融香港證券有限公司", 27.96, 64, 68.75)
                .with_aliases(&["中金", "中金公司", "中國國際金融", "CICC"]),
            r("中信證券(香港)有限公司", 41.62, 42, 83.33)
                .with_aliases(&["中信", "中信證券", "中信证券"]),
            r("中信里昂證券有限公司", 35.50, 38, 78.95).with_aliases(&["中信里昂"]),
            r("華泰金融控股(香港)有限公司", 6.86, 33, 57.58)
                .with_aliases(&["華泰", "華泰金融", "华泰"]),
            r("海通國際資本有限公司", 31.22, 28, 75.00)
                .with_aliases(&["海通", "海通國際", "海通国际"]),
            r("國泰君安融資有限公司", 23.18, 25, 76.00).with_aliases(&["國泰君安", "国泰君安"]),
            r("招商證券(香港)有限公司", 18.50, 22, 68.18)
                .with_aliases(&["招商證券", "招商", "招商证券"]),
            r("招銀國際融資有限公司", 25.56, 18, 72.22).with_aliases(&["招銀國際", "招银国际"]),
            r("建銀國際金融有限公司", 11.38, 18, 72.22).with_aliases(&["建銀國際", "建银国际"]),
            r("廣發融資（香港）有限公司", 22.30, 15, 73.33).with_aliases(&["廣發", "广发"]),
            r("交銀國際證券有限公司", 19.20, 14, 71.43).with_aliases(&["交銀國際", "交银国际"]),
            r("工銀國際融資有限公司", 12.50, 12, 66.67).with_aliases(&["工銀國際", "工银国际"]),
            r("農銀國際融資有限公司", 15.80, 10, 70.00).with_aliases(&["農銀國際", "农银国际"]),
            r("申萬宏源融資(香港)有限公司", 28.30, 12, 75.00)
                .with_aliases(&["申萬宏源", "申万宏源"]),
            r("中銀國際亞洲有限公司", 14.60, 15, 66.67).with_aliases(&["中銀國際", "中银国际"]),
            r("光大融資有限公司", 17.80, 8, 62.50).with_aliases(&["光大"]),
            r("民銀資本有限公司", -5.20, 12, 41.67).with_aliases(&["民銀資本", "民银资本"]),
            r("中信建投(國際)融資有限公司", 15.20, 10, 70.00).with_aliases(&["中信建投"]),
            r("東方證券(香港)有限公司", 12.80, 8, 62.50).with_aliases(&["東方證券", "东方证券"]),
            r("興證國際融資有限公司", 8.50, 9, 55.56).with_aliases(&["興證國際", "兴证国际"]),
            r("國信證券(香港)融資有限公司", 10.20, 8, 62.50)
                .with_aliases(&["國信證券", "国信证券"]),
            r("長江證券(香港)有限公司", 6.80, 6, 50.00).with_aliases(&["長江證券", "长江证券"]),
            r("方正證券(香港)融資有限公司", 5.50, 5, 40.00)
                .with_aliases(&["方正證券", "方正证券"]),
            // International banks
            r("摩根士丹利亞洲有限公司", 21.91, 35, 77.14)
                .with_aliases(&["摩根士丹利", "Morgan Stanley"]),
            r("高盛(亞洲)有限責任公司", 15.58, 30, 73.33).with_aliases(&["高盛", "Goldman"]),
            r("瑞銀證券香港有限公司", 16.22, 25, 72.00).with_aliases(&["瑞銀", "UBS", "瑞银"]),
            r("花旗環球金融亞洲有限公司", 18.50, 20, 75.00).with_aliases(&["花旗", "Citi"]),
            r("摩根大通證券(遠東)有限公司", 19.80, 28, 75.00).with_aliases(&[
                "J.P. Morgan Securities (Far East) Limited",
                "摩根大通",
                "J.P. Morgan",
                "JPMorgan",
            ]),
            r("美銀證券", 14.20, 18, 66.67).with_aliases(&["BofA Securities"]),
            r("德意志銀行", 8.50, 12, 58.33),
            r("巴克萊", 10.20, 10, 60.00),
            r("法國巴黎銀行", 12.50, 8, 62.50),
            r("匯豐", 11.80, 15, 66.67),
            r("渣打", 9.50, 10, 60.00),
            // Local houses
            r("大華繼顯(香港)有限公司", 5.20, 15, 53.33).with_aliases(&["大華繼顯", "大华继显"]),
            r("力高企業融資有限公司", 3.80, 12, 50.00).with_aliases(&["力高"]),
            r("艾德證券", 6.50, 8, 50.00),
            r("寶新金融", 4.20, 6, 50.00),
            r("第一上海", 7.80, 10, 60.00),
        ])
    }
}

/* ----------------------------
Crawler dataset
---------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetFile {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    sponsors: Vec<DatasetRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetRow {
    name: String,
    count: u32,
    #[serde(default)]
    up_count: Option<u32>,
    avg_first_day: f64,
    #[serde(default)]
    win_rate: Option<f64>,
}

/// Sponsor statistics as published by the crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct SponsorDataset {
    pub updated_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub records: Vec<SponsorRecord>,
}

impl SponsorDataset {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let file: DatasetFile = serde_json::from_str(s).context("invalid sponsor dataset JSON")?;
        let records = file
            .sponsors
            .into_iter()
            .map(|row| {
                let win_rate = row.win_rate.or_else(|| match (row.up_count, row.count) {
                    (Some(up), n) if n > 0 => Some((up as f64 / n as f64 * 10_000.0).round() / 100.0),
                    _ => None,
                });
                SponsorRecord {
                    name: row.name,
                    aliases: Vec::new(),
                    avg_first_day_return: row.avg_first_day,
                    deal_count: row.count,
                    win_rate,
                }
            })
            .collect();
        Ok(Self {
            updated_at: file.updated_at,
            source: file.source,
            records,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read sponsor dataset at {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("sponsor dataset {}", path.display()))
    }

    /// Age of the dataset in whole days, when it carries a timestamp.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.updated_at.map(|t| (now - t).num_days())
    }

    pub fn into_table(self) -> SponsorTable {
        SponsorTable::from_records(self.records)
    }
}

/* ----------------------------
Stock-code mapping
---------------------------- */

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    mapping: BTreeMap<String, MappingEntry>,
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(default)]
    sponsors: Vec<String>,
}

/// Stock code (5-digit) → sponsor names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockSponsorMap {
    by_code: BTreeMap<String, Vec<String>>,
}

impl StockSponsorMap {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let file: MappingFile = serde_json::from_str(s).context("invalid stock-code mapping JSON")?;
        let by_code = file
            .mapping
            .into_iter()
            .filter(|(_, e)| !e.sponsors.is_empty())
            .map(|(code, e)| (format_stock_code(&code), e.sponsors))
            .collect();
        Ok(Self { by_code })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read stock-code mapping at {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("stock-code mapping {}", path.display()))
    }

    pub fn insert(&mut self, code: &str, sponsors: Vec<String>) {
        self.by_code.insert(format_stock_code(code), sponsors);
    }

    /// Sponsor names for a stock code; any code format is accepted.
    pub fn sponsors_for(&self, code: &str) -> Option<&[String]> {
        self.by_code
            .get(&format_stock_code(code))
            .map(Vec::as_slice)
            .filter(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/* ----------------------------
Combined reference + handle
---------------------------- */

/// Everything the sponsor rule consults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SponsorReference {
    pub table: SponsorTable,
    pub by_code: StockSponsorMap,
}

impl SponsorReference {
    pub fn new(table: SponsorTable, by_code: StockSponsorMap) -> Self {
        Self { table, by_code }
    }

    /// Built-in seed only, no stock-code mapping.
    pub fn builtin() -> Self {
        Self::new(SponsorTable::default_seed(), StockSponsorMap::default())
    }

    /// Seed merged with the crawler dataset at `sponsors_path` (when readable),
    /// plus the mapping at `mapping_path` (when readable). Never fails.
    pub fn load(sponsors_path: &Path, mapping_path: &Path) -> Self {
        let mut table = SponsorTable::default_seed();
        match SponsorDataset::load(sponsors_path) {
            Ok(ds) => {
                let age = ds.age_days(Utc::now());
                let rows = ds.records.len();
                info!(
                    target: "sponsors",
                    path = %sponsors_path.display(),
                    rows,
                    source = ds.source.as_deref().unwrap_or("unknown"),
                    age_days = ?age,
                    "loaded sponsor dataset"
                );
                table = table.merge(ds.into_table());
            }
            Err(e) => warn!(
                target: "sponsors",
                error = %format!("{e:#}"),
                "sponsor dataset unavailable; using built-in table"
            ),
        }

        let by_code = match StockSponsorMap::load(mapping_path) {
            Ok(m) => {
                info!(target: "sponsors", path = %mapping_path.display(), codes = m.len(), "loaded stock-code mapping");
                m
            }
            Err(e) => {
                warn!(
                    target: "sponsors",
                    error = %format!("{e:#}"),
                    "stock-code mapping unavailable; fallback lookup disabled"
                );
                StockSponsorMap::default()
            }
        };

        Self::new(table, by_code)
    }

    /// Load using `IPO_SPONSORS_PATH` / `IPO_SPONSOR_MAPPING_PATH` or the defaults.
    pub fn from_env() -> Self {
        let sponsors = env_path(ENV_SPONSORS_PATH, DEFAULT_SPONSORS_PATH);
        let mapping = env_path(ENV_SPONSOR_MAPPING_PATH, DEFAULT_SPONSOR_MAPPING_PATH);
        Self::load(&sponsors, &mapping)
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Shared, swappable reference data. Take one `snapshot()` per batch; a
/// `replace()` during the batch does not affect it.
#[derive(Clone, Debug)]
pub struct ReferenceHandle {
    inner: Arc<RwLock<Arc<SponsorReference>>>,
}

impl ReferenceHandle {
    pub fn new(reference: SponsorReference) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(reference))),
        }
    }

    pub fn snapshot(&self) -> Arc<SponsorReference> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, reference: SponsorReference) {
        let fresh = Arc::new(reference);
        match self.inner.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

/// Distinct names in first-seen order.
pub(crate) fn dedup_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(*n))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "updatedAt": "2026-01-15T08:00:00.000Z",
        "source": "aastocks",
        "sponsors": [
            { "name": "中信證券(香港)有限公司", "count": 45, "upCount": 36, "downCount": 9,
              "avgFirstDay": 44.1, "avgCumulative": 50.2, "winRate": 80.0 },
            { "name": "新保薦人有限公司", "count": 10, "upCount": 7, "downCount": 3,
              "avgFirstDay": 12.0, "avgCumulative": 9.0 }
        ]
    }"#;

    #[test]
    fn seed_indexes_names_and_aliases() {
        let t = SponsorTable::default_seed();
        let full = t.get("中國國際金融香港證券有限公司").unwrap();
        let short = t.get("CICC").unwrap();
        assert_eq!(full, short);
        assert_eq!(full.deal_count, 64);
        assert!(t.get("不存在").is_none());
    }

    #[test]
    fn dataset_overrides_seed_and_derives_win_rate() {
        let ds = SponsorDataset::from_json_str(DATASET).unwrap();
        assert_eq!(ds.source.as_deref(), Some("aastocks"));
        assert_eq!(ds.records[1].win_rate, Some(70.0));

        let merged = SponsorTable::default_seed().merge(ds.into_table());
        let citic = merged.get("中信證券(香港)有限公司").unwrap();
        assert_eq!(citic.deal_count, 45);
        assert!((citic.avg_first_day_return - 44.1).abs() < 1e-9);
        // aliases not named by the dataset keep the seed values
        assert_eq!(merged.get("中信").unwrap().deal_count, 42);
        assert!(merged.get("新保薦人有限公司").is_some());
    }

    #[test]
    fn dataset_age_in_days() {
        let ds = SponsorDataset::from_json_str(DATASET).unwrap();
        let now = DateTime::parse_from_rfc3339("2026-01-25T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ds.age_days(now), Some(10));
    }

    #[test]
    fn mapping_lookup_pads_codes() {
        let m = StockSponsorMap::from_json_str(
            r#"{ "count": 2, "mapping": {
                "02677": { "sponsors": ["中信證券(香港)有限公司"] },
                "600":   { "sponsors": [] }
            } }"#,
        )
        .unwrap();
        assert_eq!(m.sponsors_for("2677").unwrap().len(), 1);
        assert!(m.sponsors_for("00600").is_none());
        assert!(m.sponsors_for("09999").is_none());
    }

    #[test]
    fn resolve_exact_normalized_then_partial() {
        let t = SponsorTable::default_seed();
        assert_eq!(t.resolve("高盛").unwrap().0, "高盛");
        // simplified spelling of a traditional full name
        let (_, rec) = t.resolve("摩根士丹利亚洲有限公司").unwrap();
        assert_eq!(rec.deal_count, 35);
        // longer external name containing a known key
        let (key, _) = t.resolve("中信里昂證券有限公司（香港分行）").unwrap();
        assert_eq!(key, "中信里昂證券有限公司");
        assert!(t.resolve("無名氏").is_none());
    }

    #[test]
    fn top_lists_distinct_entities() {
        let t = SponsorTable::default_seed();
        let top = t.top(3, 8);
        let names: Vec<_> = top.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            ["中國國際金融香港證券有限公司", "中信證券(香港)有限公司", "中信里昂證券有限公司"]
        );
        assert!(t.top(100, 8).iter().all(|r| r.deal_count >= 8));
    }

    #[test]
    fn handle_snapshot_survives_replace() {
        let handle = ReferenceHandle::new(SponsorReference::builtin());
        let before = handle.snapshot();
        handle.replace(SponsorReference::default());
        assert!(!before.table.is_empty());
        assert!(handle.snapshot().table.is_empty());
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        assert_eq!(dedup_names(["b", "a", "b"]), ["b", "a"]);
    }
}
