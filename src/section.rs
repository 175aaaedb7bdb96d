// src/section.rs
//! Section extraction: carve a sub-range out of a prospectus using ordered
//! start markers, end markers and a hard length cap.
//!
//! Prospectuses repeat every section heading in the table of contents, where the
//! heading is followed by a dotted leader and a page number ("行業概覽....... 12").
//! Occurrences followed by such a leader are skipped, so the range starts at the
//! real heading.
//!
//! All lengths are counted in characters (Chinese prose: one char ≈ one token);
//! all offsets returned are byte offsets into the input.

use crate::evidence::{RangeOrigin, SectionEvidence};
use crate::normalize::normalize;
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;

/// How many characters after a start marker are inspected for a ToC leader.
const TOC_PEEK_CHARS: usize = 30;

/// Three dot-like characters (optionally spaced) or an ellipsis right after the marker.
static TOC_LEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[.．·][\s.．·]*[.．·][\s.．·]*[.．·]|…)").expect("toc leader regex")
});

/// A rule's recipe for one candidate section.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    /// Stable id used in evidence and logs (e.g. "industry_overview").
    pub name: String,
    /// Human-readable label (e.g. "行業概覽章节").
    pub label: String,
    /// Tried in order; the first pattern with a non-ToC occurrence wins.
    pub starts: Vec<Regex>,
    /// Every end pattern may tighten the range; the earliest hit wins.
    pub ends: Vec<Regex>,
    /// Hard cap on the range length, in characters.
    pub max_chars: usize,
    /// Ranges shorter than this are treated as "not found".
    pub min_chars: usize,
    pub skip_toc: bool,
}

/// A located section: byte offsets into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub start: usize,
    pub marker_end: usize,
    pub end: usize,
}

impl SectionSpec {
    pub fn locate(&self, text: &str) -> Option<Located> {
        let loc = locate_range(text, &self.starts, &self.ends, self.max_chars, self.skip_toc)?;
        if self.min_chars > 0 && char_len(&text[loc.start..loc.end]) < self.min_chars {
            return None;
        }
        Some(loc)
    }
}

/// Extract a section as a plain slice; empty string when no start marker matches.
///
/// Never fails: callers treat `""` as "fall back to a bounded prefix".
pub fn extract_section<'a>(
    text: &'a str,
    starts: &[Regex],
    ends: &[Regex],
    max_chars: usize,
    skip_toc: bool,
) -> &'a str {
    match locate_range(text, starts, ends, max_chars, skip_toc) {
        Some(loc) => &text[loc.start..loc.end],
        None => "",
    }
}

fn locate_range(
    text: &str,
    starts: &[Regex],
    ends: &[Regex],
    max_chars: usize,
    skip_toc: bool,
) -> Option<Located> {
    for start_re in starts {
        for m in start_re.find_iter(text) {
            if m.start() == m.end() {
                continue;
            }
            if skip_toc && is_toc_entry(&text[m.end()..]) {
                continue;
            }

            let start = m.start();
            let mut end = advance_chars(text, start, max_chars);
            let rest = &text[m.end()..];
            for end_re in ends {
                if let Some(em) = end_re.find(rest) {
                    end = end.min(m.end() + em.start());
                }
            }
            return Some(Located {
                start,
                marker_end: m.end(),
                end,
            });
        }
    }
    None
}

/// True when the text right after a marker looks like a dotted ToC leader.
pub fn is_toc_entry(after_marker: &str) -> bool {
    let peek_end = advance_chars(after_marker, 0, TOC_PEEK_CHARS);
    TOC_LEADER.is_match(&after_marker[..peek_end])
}

/// Byte offset `n` characters after `from` (clamped to the end of `text`).
pub(crate) fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters before `from` (clamped to 0).
pub(crate) fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Bounded fallback window used when no section of a plan is found.
///
/// The window covers `chars` characters starting at `skip_chars`; when the
/// document is too short for that, the window slides back towards the start
/// so it still covers up to `chars` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    pub skip_chars: usize,
    pub chars: usize,
}

impl Fallback {
    pub fn prefix(chars: usize) -> Self {
        Self {
            skip_chars: 0,
            chars,
        }
    }

    pub fn label(&self) -> String {
        if self.skip_chars == 0 {
            format!("招股书前{}字", self.chars)
        } else {
            format!("招股书第{}字起{}字", self.skip_chars, self.chars)
        }
    }

    fn apply<'a>(&self, text: &'a str) -> (&'a str, usize) {
        let total = char_len(text);
        let skip = self.skip_chars.min(total.saturating_sub(self.chars));
        let start = advance_chars(text, 0, skip);
        let end = advance_chars(text, start, self.chars);
        (&text[start..end], start)
    }
}

/// Ordered section recipes plus the fallback used when none matches.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub sections: Vec<SectionSpec>,
    pub fallback: Fallback,
}

impl SearchPlan {
    /// Resolve the range a rule should search. Always succeeds.
    pub fn resolve<'a>(&self, text: &'a str) -> SearchRange<'a> {
        for spec in &self.sections {
            if let Some(loc) = spec.locate(text) {
                return SearchRange {
                    text: &text[loc.start..loc.end],
                    offset: loc.start,
                    origin: RangeOrigin::Section,
                    name: spec.name.clone(),
                    label: spec.label.clone(),
                    normalized: OnceCell::new(),
                };
            }
        }
        let (slice, offset) = self.fallback.apply(text);
        SearchRange {
            text: slice,
            offset,
            origin: RangeOrigin::Fallback,
            name: "fallback".into(),
            label: self.fallback.label(),
            normalized: OnceCell::new(),
        }
    }
}

/// The text a rule searches, with provenance and a lazily normalized copy.
#[derive(Debug)]
pub struct SearchRange<'a> {
    pub text: &'a str,
    /// Byte offset of `text` inside the full document.
    pub offset: usize,
    pub origin: RangeOrigin,
    pub name: String,
    pub label: String,
    normalized: OnceCell<String>,
}

impl<'a> SearchRange<'a> {
    /// A range over arbitrary text (whole document, windows, tests).
    pub fn new(text: &'a str, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text,
            offset: 0,
            origin: RangeOrigin::Section,
            name: name.into(),
            label: label.into(),
            normalized: OnceCell::new(),
        }
    }

    pub fn normalized(&self) -> &str {
        self.normalized.get_or_init(|| normalize(self.text))
    }

    pub fn is_section(&self) -> bool {
        self.origin == RangeOrigin::Section
    }

    pub fn evidence(&self) -> SectionEvidence {
        SectionEvidence {
            origin: self.origin,
            name: self.name.clone(),
            label: self.label.clone(),
            chars: char_len(self.text),
        }
    }
}
