use std::sync::LazyLock;

use regex::Regex;

/// Bracketed markers such as footnotes (`[3]`) or edit links (`[edit]`).
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\w+\]").unwrap());

/// The 50 states, the federal district and the inhabited territories.
pub const JURISDICTIONS: &[&str] = &[
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado", "Connecticut",
    "Delaware", "Florida", "Georgia", "Hawaii", "Idaho", "Illinois", "Indiana", "Iowa",
    "Kansas", "Kentucky", "Louisiana", "Maine", "Maryland", "Massachusetts", "Michigan",
    "Minnesota", "Mississippi", "Missouri", "Montana", "Nebraska", "Nevada", "New Hampshire",
    "New Jersey", "New Mexico", "New York", "North Carolina", "North Dakota", "Ohio",
    "Oklahoma", "Oregon", "Pennsylvania", "Rhode Island", "South Carolina", "South Dakota",
    "Tennessee", "Texas", "Utah", "Vermont", "Virginia", "Washington", "West Virginia",
    "Wisconsin", "Wyoming", "District of Columbia", "Puerto Rico", "Guam", "American Samoa",
    "U.S. Virgin Islands", "Northern Mariana Islands",
];

/// Strip bracketed markers and surrounding whitespace from heading text.
pub fn clean_heading(text: &str) -> String {
    MARKER_RE.replace_all(text, "").trim().to_string()
}

/// Whether the heading names one of [`JURISDICTIONS`] (case-insensitive containment).
pub fn is_recognized(heading: &str) -> bool {
    recognize(heading).is_some()
}

/// The matching jurisdiction name. When several are contained ("West Virginia"
/// also contains "Virginia") the longest wins.
pub fn recognize(heading: &str) -> Option<&'static str> {
    let cleaned = clean_heading(heading).to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    JURISDICTIONS
        .iter()
        .copied()
        .filter(|name| cleaned.contains(&name.to_lowercase()))
        .max_by_key(|name| name.len())
}
