//! Text normalization for fuzzy matching over prospectus text.
//!
//! `normalize` canonicalizes a string so that keyword matching is insensitive to:
//! - line wrapping (all whitespace is removed, not collapsed),
//! - full-width ASCII variants (U+FF01..=U+FF5E → U+0021..=U+007E),
//! - a fixed set of traditional characters common in financial/legal vocabulary,
//! - a trailing corporate suffix ("有限公司" / "有限责任公司").
//!
//! The function is idempotent: `normalize(&normalize(s)) == normalize(s)`.

/// Offset between a full-width ASCII-range character and its half-width form.
const FULLWIDTH_OFFSET: u32 = 0xFEE0;

/// Traditional → simplified substitutions. Only characters that show up in
/// sponsor names, section headings and industry keywords are listed.
const TRAD_TO_SIMP: &[(char, char)] = &[
    ('證', '证'),
    ('國', '国'),
    ('際', '际'),
    ('銀', '银'),
    ('資', '资'),
    ('業', '业'),
    ('發', '发'),
    ('項', '项'),
    ('實', '实'),
    ('與', '与'),
    ('為', '为'),
    ('無', '无'),
    ('個', '个'),
    ('開', '开'),
    ('關', '关'),
    ('機', '机'),
    ('車', '车'),
    ('電', '电'),
    ('導', '导'),
    ('體', '体'),
    ('產', '产'),
    ('軟', '软'),
    ('製', '制'),
    ('廠', '厂'),
    ('責', '责'),
];

/// Corporate suffixes stripped from the end of a normalized string
/// (already in simplified form, since substitution runs first).
const CORPORATE_SUFFIXES: &[&str] = &["有限责任公司", "有限公司"];

/// Canonicalize `text` for matching. Empty input yields empty output.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        out.push(simplify(halfwidth(ch)));
    }

    // Strip repeatedly so that a doubled suffix cannot survive one pass.
    loop {
        let before = out.len();
        for suffix in CORPORATE_SUFFIXES {
            if let Some(keep) = out.strip_suffix(suffix).map(str::len) {
                out.truncate(keep);
            }
        }
        if out.len() == before {
            break;
        }
    }
    out
}

#[inline]
fn halfwidth(ch: char) -> char {
    let cp = ch as u32;
    if (0xFF01..=0xFF5E).contains(&cp) {
        char::from_u32(cp - FULLWIDTH_OFFSET).unwrap_or(ch)
    } else {
        ch
    }
}

#[inline]
fn simplify(ch: char) -> char {
    TRAD_TO_SIMP
        .iter()
        .find(|(t, _)| *t == ch)
        .map(|(_, s)| *s)
        .unwrap_or(ch)
}

/// Format a stock identifier as the exchange's 5-digit code:
/// non-digits are dropped, the rest is left-padded with zeros.
pub fn format_stock_code(code: &str) -> String {
    let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{:0>5}", digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_all_whitespace() {
        let s = normalize("中國 國際\n金融\t香港\u{3000}證券");
        assert_eq!(s, "中国国际金融香港证券");
        assert!(!s.chars().any(char::is_whitespace));
    }

    #[test]
    fn fullwidth_to_halfwidth() {
        assert_eq!(normalize("ＵＢＳ（香港）：１２３"), "UBS(香港):123");
    }

    #[test]
    fn strips_corporate_suffix_at_end_only() {
        assert_eq!(normalize("摩根士丹利亞洲有限公司"), "摩根士丹利亚洲");
        assert_eq!(normalize("高盛(亞洲)有限責任公司"), "高盛(亚洲)");
        assert_eq!(normalize("有限公司之附屬"), "有限公司之附属");
    }

    #[test]
    fn idempotent_on_tricky_inputs() {
        for s in [
            "",
            "   ",
            "甲有限公司有限公司",
            "乙有限責任公司 有限公司",
            "ＡＢＣ 證券 國際",
            "Pre-IPO 投資",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn stock_code_padding() {
        assert_eq!(format_stock_code("2677"), "02677");
        assert_eq!(format_stock_code("HK.600"), "00600");
        assert_eq!(format_stock_code("06809"), "06809");
        assert_eq!(format_stock_code(""), "00000");
    }
}
