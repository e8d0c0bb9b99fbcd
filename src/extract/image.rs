use std::sync::LazyLock;

use regex::Regex;

use crate::parser::InformationBlock;
use crate::stats::{Counter, RunStatistics};

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

pub fn extract_description(block: &InformationBlock) -> Option<&str> {
    block.description()
}

pub fn extract_date_field(block: &InformationBlock) -> Option<&str> {
    block.date()
}

/// Year candidates read from an Information block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageYear {
    /// First four-digit run of the date field, unless the field is an upload note.
    pub date_year: Option<String>,
    /// Year named by the description, when all of its four-digit runs agree.
    pub description_year: Option<String>,
    /// Four-digit runs found in the date field, trusted or not.
    pub date_matches: usize,
}

impl ImageYear {
    /// The date field is authoritative; the description only fills in for it.
    pub fn year(&self) -> Option<&str> {
        self.date_year
            .as_deref()
            .or(self.description_year.as_deref())
    }

    pub fn has_multiple_dates(&self) -> bool {
        self.date_matches > 1
    }

    pub fn has_discrepancy(&self) -> bool {
        matches!(
            (&self.date_year, &self.description_year),
            (Some(date), Some(desc)) if date != desc
        )
    }

    /// Count the data-quality flags for this image.
    pub fn tally(&self, stats: &mut RunStatistics) {
        if self.has_multiple_dates() {
            stats.record(Counter::MultipleDates);
        }
        if self.has_discrepancy() {
            stats.record(Counter::DateDescDiscrepancy);
        }
    }
}

/// Work out when the image was created.
///
/// Ambiguity in the date field (several years) takes the first match and is
/// flagged; ambiguity in the description discards the description silently.
pub fn extract_image_year(block: &InformationBlock) -> ImageYear {
    let mut result = ImageYear::default();

    if let Some(date) = extract_date_field(block) {
        let matches: Vec<&str> = YEAR_RE.find_iter(date).map(|m| m.as_str()).collect();
        result.date_matches = matches.len();
        // An upload date says nothing about when the photo was taken.
        if !date.contains("upload") {
            result.date_year = matches.first().map(|y| y.to_string());
        }
    }

    if let Some(desc) = extract_description(block) {
        let matches: Vec<&str> = YEAR_RE.find_iter(desc).map(|m| m.as_str()).collect();
        if let Some(first) = matches.first() {
            if matches.iter().all(|y| y == first) {
                result.description_year = Some(first.to_string());
            }
        }
    }

    result
}
