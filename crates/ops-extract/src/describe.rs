//! Description composition.
//!
//! Both descriptions are built from the same ordered template. Lines whose
//! source is empty are omitted, except Pattern and Color (and, on the sales
//! side, Country of Origin) which always appear and fall back to the
//! sentinel. Abrasion text is cleaned of placeholder tokens first; a line
//! that cleans down to nothing is omitted entirely.

use ops_schemas::SENTINEL;

/// Placeholder tokens stripped from abrasion text, matched
/// case-insensitively. "(unknown)" is listed before "unknown" so the
/// parenthetical form is removed as a unit.
const ABRASION_PLACEHOLDERS: &[&str] = &["(unknown)", "unknown", "don't know", "n/a"];

/// Strip placeholder tokens; `None` when nothing meaningful remains.
pub fn clean_abrasion(raw: &str) -> Option<String> {
    let mut text = raw.to_string();
    for token in ABRASION_PLACEHOLDERS {
        loop {
            let lower = text.to_lowercase();
            let Some(pos) = lower.find(token) else { break };
            text.replace_range(pos..pos + token.len(), "");
        }
    }

    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '-')
        .to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// The raw parts both descriptions draw from.
#[derive(Debug, Clone, Default)]
pub struct DescriptionParts<'a> {
    pub item_code: &'a str,
    pub product_name: Option<&'a str>,
    pub color_names: &'a [String],
    pub width: Option<f64>,
    pub vertical_repeat: Option<f64>,
    pub horizontal_repeat: Option<f64>,
    pub front_content: Option<&'a str>,
    pub back_content: Option<&'a str>,
    /// Already cleaned via [`clean_abrasion`].
    pub abrasion: Option<&'a str>,
    pub firecodes: Option<&'a str>,
    pub origin: Option<&'a str>,
}

fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn push_if_present(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(v) = value {
        let v = v.trim();
        if !v.is_empty() {
            lines.push(format!("{label}: {v}"));
        }
    }
}

fn repeat_line(parts: &DescriptionParts<'_>) -> Option<String> {
    match (parts.horizontal_repeat, parts.vertical_repeat) {
        (None, None) => None,
        (h, v) => {
            let h = h.map(fmt_number).unwrap_or_else(|| SENTINEL.trim().to_string());
            let v = v.map(fmt_number).unwrap_or_else(|| SENTINEL.trim().to_string());
            Some(format!("Repeat: H: {h} V: {v}"))
        }
    }
}

fn pattern_line(parts: &DescriptionParts<'_>) -> String {
    let name = parts
        .product_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SENTINEL);
    format!("Pattern: {name}")
}

fn color_line(parts: &DescriptionParts<'_>) -> String {
    if parts.color_names.is_empty() {
        format!("Color: {SENTINEL}")
    } else {
        format!("Color: {}", parts.color_names.join(", "))
    }
}

/// Multi-line purchase description. Pattern and Color always appear.
pub fn purchase_description(parts: &DescriptionParts<'_>) -> String {
    let mut lines = vec![pattern_line(parts), color_line(parts)];

    if let Some(w) = parts.width {
        lines.push(format!("Width: {}", fmt_number(w)));
    }
    if let Some(line) = repeat_line(parts) {
        lines.push(line);
    }
    push_if_present(&mut lines, "Content", parts.front_content);
    push_if_present(&mut lines, "Back Content", parts.back_content);
    push_if_present(&mut lines, "Abrasion", parts.abrasion);
    push_if_present(&mut lines, "Fire Rating", parts.firecodes);

    lines.join("\n")
}

/// Multi-line sales description. Leads with the item code; Country of
/// Origin always appears with the sentinel fallback.
pub fn sales_description(parts: &DescriptionParts<'_>) -> String {
    let mut lines = vec![
        format!("#{}", parts.item_code),
        pattern_line(parts),
        color_line(parts),
    ];

    if let Some(w) = parts.width {
        lines.push(format!("Width: {}", fmt_number(w)));
    }
    if let Some(line) = repeat_line(parts) {
        lines.push(line);
    }
    push_if_present(&mut lines, "Content", parts.front_content);
    push_if_present(&mut lines, "Back Content", parts.back_content);
    push_if_present(&mut lines, "Abrasion", parts.abrasion);
    push_if_present(&mut lines, "Fire Rating", parts.firecodes);

    let origin = parts
        .origin
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SENTINEL);
    lines.push(format!("Country of Origin: {origin}"));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_abrasion_strips_placeholders() {
        assert_eq!(
            clean_abrasion("30,000 double rubs (Unknown)"),
            Some("30,000 double rubs".to_string())
        );
        assert_eq!(clean_abrasion("Wyzenbeek: don't know"), Some("Wyzenbeek:".to_string()));
        assert_eq!(clean_abrasion("UNKNOWN"), None);
        assert_eq!(clean_abrasion("n/a"), None);
        assert_eq!(clean_abrasion("  N/A  unknown "), None);
    }

    #[test]
    fn clean_abrasion_keeps_real_text() {
        assert_eq!(
            clean_abrasion("51,000 double rubs Wyzenbeek"),
            Some("51,000 double rubs Wyzenbeek".to_string())
        );
    }

    fn base_parts<'a>(colors: &'a [String]) -> DescriptionParts<'a> {
        DescriptionParts {
            item_code: "1354-6543",
            product_name: Some("Tranquil"),
            color_names: colors,
            width: Some(54.0),
            vertical_repeat: Some(12.5),
            horizontal_repeat: Some(8.25),
            front_content: Some("100% Cotton"),
            back_content: None,
            abrasion: Some("30,000 double rubs"),
            firecodes: Some("CA TB 117-2013"),
            origin: Some("Italy"),
        }
    }

    #[test]
    fn purchase_description_orders_lines() {
        let colors = vec!["Ash".to_string()];
        let d = purchase_description(&base_parts(&colors));
        let lines: Vec<&str> = d.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Pattern: Tranquil",
                "Color: Ash",
                "Width: 54",
                "Repeat: H: 8.25 V: 12.5",
                "Content: 100% Cotton",
                "Abrasion: 30,000 double rubs",
                "Fire Rating: CA TB 117-2013",
            ]
        );
    }

    #[test]
    fn pattern_and_color_always_appear_with_sentinel() {
        let colors: Vec<String> = vec![];
        let parts = DescriptionParts {
            item_code: "0001-0001",
            product_name: None,
            color_names: &colors,
            ..Default::default()
        };
        let d = purchase_description(&parts);
        assert_eq!(d, format!("Pattern: {SENTINEL}\nColor: {SENTINEL}"));
    }

    #[test]
    fn sales_description_leads_with_code_and_ends_with_origin() {
        let colors = vec!["Ash".to_string(), "Slate".to_string()];
        let d = sales_description(&base_parts(&colors));
        let lines: Vec<&str> = d.lines().collect();
        assert_eq!(lines.first(), Some(&"#1354-6543"));
        assert_eq!(lines.get(2), Some(&"Color: Ash, Slate"));
        assert_eq!(lines.last(), Some(&"Country of Origin: Italy"));
    }

    #[test]
    fn sales_origin_falls_back_to_sentinel() {
        let colors = vec!["Ash".to_string()];
        let mut parts = base_parts(&colors);
        parts.origin = None;
        let d = sales_description(&parts);
        assert!(d.ends_with(&format!("Country of Origin: {SENTINEL}")));
    }

    #[test]
    fn repeat_line_omitted_only_when_both_absent() {
        let colors = vec!["Ash".to_string()];
        let mut parts = base_parts(&colors);
        parts.vertical_repeat = None;
        parts.horizontal_repeat = None;
        assert!(!purchase_description(&parts).contains("Repeat:"));

        parts.horizontal_repeat = Some(3.0);
        let d = purchase_description(&parts);
        assert!(d.contains("Repeat: H: 3 V: -"));
    }
}
