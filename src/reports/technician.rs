//! Technician attribution from free-text order notes
//!
//! Orders carry no technician column; staff write `Técnico: Name` in the
//! notes. `Tecnico:` and `Technician:` are accepted too, in any case.

use std::sync::OnceLock;

use regex::Regex;

/// Bucket for orders whose notes name nobody
pub const UNASSIGNED: &str = "Unassigned";

fn technician_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:t[eé]cnico|technician)\s*:\s*([^\n\r,;]+)").unwrap()
    })
}

/// Technician named in `notes`, if any
pub fn extract(notes: Option<&str>) -> Option<String> {
    let captures = technician_regex().captures(notes?)?;
    let name = captures
        .get(1)?
        .as_str()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let name = name.trim_end_matches('.').trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Technician for grouping, falling back to [`UNASSIGNED`]
pub fn attribute(notes: Option<&str>) -> String {
    extract(notes).unwrap_or_else(|| UNASSIGNED.to_string())
}
