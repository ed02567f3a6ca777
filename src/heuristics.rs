use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Doi;

static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+").expect("valid regex"));
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19\d{2}|20\d{2})\b").expect("valid regex"));

const MIN_YEAR_EXCLUSIVE: i32 = 1800;

pub fn extract_doi(text: &str) -> Option<Doi> {
    // A match that is only punctuation after the slash does not count.
    DOI_RE.find_iter(text).find_map(|found| {
        found
            .as_str()
            .trim_end_matches(['.', ')', ',', ';'])
            .parse()
            .ok()
    })
}

pub fn extract_year(text: &str) -> Option<i32> {
    extract_year_with_current(text, current_year())
}

pub fn extract_year_with_current(text: &str, current_year: i32) -> Option<i32> {
    YEAR_RE
        .find_iter(text)
        .filter_map(|value| value.as_str().parse::<i32>().ok())
        .filter(|year| is_plausible_year(*year, current_year))
        .max()
}

pub fn is_plausible_year(year: i32, current_year: i32) -> bool {
    year > MIN_YEAR_EXCLUSIVE && year <= current_year + 1
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
