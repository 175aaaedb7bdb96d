//! Keyword matching with word-boundary and glossary safeguards.
//!
//! Matching rules depend on the keyword's shape:
//! - pure CJK keyword → plain substring containment,
//! - short ASCII alphanumeric keyword (≤ `short_token_max`) → must be bounded by a
//!   non-alphanumeric character or the string edge on both sides, case-insensitive
//!   ("L3" must not match inside "L330TOPSPCB"),
//! - anything else → plain substring containment.
//!
//! `is_definition_list` rejects matches that sit inside an abbreviation/definition
//! table (a dense run of short uppercase tokens), which prospectuses carry in
//! their glossary sections.

use crate::evidence::KeywordHit;
use crate::normalize::normalize;
use crate::section::{advance_chars, retreat_chars, SearchRange};
use serde::Deserialize;

/// Shape of a keyword, which decides how it is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordShape {
    Cjk,
    ShortAlnum,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatcher {
    /// ASCII alphanumeric keywords up to this many chars need word boundaries.
    pub short_token_max: usize,
    /// Substring matches ignore ASCII case (short tokens always do).
    pub ignore_ascii_case: bool,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self {
            short_token_max: 5,
            ignore_ascii_case: false,
        }
    }
}

impl KeywordMatcher {
    pub fn new(short_token_max: usize) -> Self {
        Self {
            short_token_max,
            ..Self::default()
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_ascii_case = true;
        self
    }

    pub fn shape(&self, keyword: &str) -> KeywordShape {
        if !keyword.is_empty() && keyword.chars().all(is_cjk) {
            KeywordShape::Cjk
        } else if !keyword.is_empty()
            && keyword.len() <= self.short_token_max
            && keyword.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            KeywordShape::ShortAlnum
        } else {
            KeywordShape::Other
        }
    }

    /// Byte offsets of every valid occurrence of `keyword` in `text`.
    pub fn occurrences(&self, text: &str, keyword: &str) -> Vec<usize> {
        if keyword.is_empty() {
            return Vec::new();
        }
        match self.shape(keyword) {
            KeywordShape::ShortAlnum => bounded_ascii_occurrences(text, keyword),
            KeywordShape::Cjk => text.match_indices(keyword).map(|(i, _)| i).collect(),
            KeywordShape::Other if self.ignore_ascii_case => {
                // ASCII lowercasing keeps byte offsets identical.
                let hay = text.to_ascii_lowercase();
                let needle = keyword.to_ascii_lowercase();
                hay.match_indices(needle.as_str()).map(|(i, _)| i).collect()
            }
            KeywordShape::Other => text.match_indices(keyword).map(|(i, _)| i).collect(),
        }
    }

    pub fn find(&self, text: &str, keyword: &str) -> Option<usize> {
        self.occurrences(text, keyword).into_iter().next()
    }

    pub fn matches(&self, text: &str, keyword: &str) -> bool {
        self.find(text, keyword).is_some()
    }
}

/// Convenience wrapper with the default matcher.
pub fn matches(search_text: &str, keyword: &str) -> bool {
    KeywordMatcher::default().matches(search_text, keyword)
}

pub fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

fn bounded_ascii_occurrences(text: &str, keyword: &str) -> Vec<usize> {
    let hay = text.as_bytes();
    let needle = keyword.as_bytes();
    let k = needle.len();
    if hay.len() < k {
        return Vec::new();
    }
    (0..=hay.len() - k)
        .filter(|&i| {
            hay[i..i + k].eq_ignore_ascii_case(needle)
                && (i == 0 || !hay[i - 1].is_ascii_alphanumeric())
                && (i + k == hay.len() || !hay[i + k].is_ascii_alphanumeric())
        })
        .collect()
}

/// Parameters of the glossary/definition-list filter.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DefinitionListGuard {
    /// Characters inspected before the match.
    #[serde(default = "default_guard_window")]
    pub before: usize,
    /// Characters inspected after the match.
    #[serde(default = "default_guard_window")]
    pub after: usize,
    /// Contexts with this many tokens or fewer are never a definition list.
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    /// Share of ALL-CAPS abbreviation tokens above which the context is a glossary.
    pub upper_ratio: f32,
    /// Optional share of short ASCII "technical" tokens above which the context is a glossary.
    #[serde(default)]
    pub tech_ratio: Option<f32>,
}

fn default_guard_window() -> usize {
    50
}
fn default_min_tokens() -> usize {
    5
}

impl DefinitionListGuard {
    /// Inspect the window around `text[pos..pos + len]`.
    pub fn rejects(&self, text: &str, pos: usize, len: usize) -> bool {
        let from = retreat_chars(text, pos, self.before);
        let to = advance_chars(text, pos + len, self.after);
        is_definition_list(&text[from..to], self)
    }
}

/// True when `context` looks like a run of abbreviation definitions.
pub fn is_definition_list(context: &str, guard: &DefinitionListGuard) -> bool {
    let words: Vec<&str> = context.split_whitespace().collect();
    if words.len() <= guard.min_tokens {
        return false;
    }
    let n = words.len() as f32;
    let upper = words.iter().filter(|w| is_upper_abbreviation(w)).count() as f32;
    if upper / n > guard.upper_ratio {
        return true;
    }
    match guard.tech_ratio {
        Some(ratio) => {
            let tech = words.iter().filter(|w| is_tech_token(w)).count() as f32;
            tech / n > ratio
        }
        None => false,
    }
}

fn is_upper_abbreviation(w: &str) -> bool {
    w.len() >= 2
        && w.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

fn is_tech_token(w: &str) -> bool {
    (1..=15).contains(&w.len()) && w.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Size of the evidence snippet around a match, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContextWindow {
    pub before: usize,
    pub after: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            before: 30,
            after: 50,
        }
    }
}

impl ContextWindow {
    /// Whitespace-collapsed snippet around `text[pos..pos + len]`.
    pub fn snippet(&self, text: &str, pos: usize, len: usize) -> String {
        let from = retreat_chars(text, pos, self.before);
        let to = advance_chars(text, pos + len, self.after);
        collapse_whitespace(&text[from..to])
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find the first acceptable occurrence of `keyword` in `range`.
///
/// Raw text is searched first; every occurrence must pass the optional glossary
/// guard. Only when the raw text has no occurrence at all is the normalized text
/// tried (never for short ASCII tokens, whose boundaries do not survive
/// whitespace removal).
pub fn find_hit(
    range: &SearchRange<'_>,
    keyword: &str,
    matcher: &KeywordMatcher,
    guard: Option<&DefinitionListGuard>,
    window: ContextWindow,
) -> Option<KeywordHit> {
    locate_hit(range, keyword, matcher, guard, window).map(|(hit, _)| hit)
}

/// `find_hit` plus the byte offset of the match in `range.text`
/// (`None` when the match was only found in the normalized text).
pub fn locate_hit(
    range: &SearchRange<'_>,
    keyword: &str,
    matcher: &KeywordMatcher,
    guard: Option<&DefinitionListGuard>,
    window: ContextWindow,
) -> Option<(KeywordHit, Option<usize>)> {
    let raw = matcher.occurrences(range.text, keyword);
    if !raw.is_empty() {
        return raw
            .into_iter()
            .find(|&pos| !guard.is_some_and(|g| g.rejects(range.text, pos, keyword.len())))
            .map(|pos| {
                let hit = KeywordHit {
                    keyword: keyword.to_string(),
                    context: window.snippet(range.text, pos, keyword.len()),
                    normalized: false,
                };
                (hit, Some(pos))
            });
    }

    if matcher.shape(keyword) == KeywordShape::ShortAlnum {
        return None;
    }
    let needle = normalize(keyword);
    if needle.is_empty() {
        return None;
    }
    let pos = matcher.find(range.normalized(), &needle)?;
    let hit = KeywordHit {
        keyword: keyword.to_string(),
        context: window.snippet(range.normalized(), pos, needle.len()),
        normalized: true,
    };
    Some((hit, None))
}

/// First keyword of `keywords` (in order) with an acceptable hit.
pub fn first_hit<S: AsRef<str>>(
    range: &SearchRange<'_>,
    keywords: &[S],
    matcher: &KeywordMatcher,
    guard: Option<&DefinitionListGuard>,
    window: ContextWindow,
) -> Option<KeywordHit> {
    keywords
        .iter()
        .find_map(|k| find_hit(range, k.as_ref(), matcher, guard, window))
}
