use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::csv;
use crate::provider::{SubjectProvider, SubjectRef};

pub const PAGES_HEADER: [&str; 2] = ["Pagename", "hasImage(bool)"];
pub const INFO_HEADER: [&str; 5] = ["category", "total_pages", "has_image", "excluded", "time_seconds"];
pub const INFO_FILE: &str = "info.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct PagePresence {
    pub title: String,
    pub has_image: bool,
}

#[derive(Debug, Clone)]
pub struct SurveySummary {
    pub category: String,
    pub total: usize,
    pub has_image: usize,
    pub excluded: usize,
    pub elapsed: Duration,
}

impl SurveySummary {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.has_image as f64 / self.total as f64
        }
    }

    fn info_row(&self) -> [String; 5] {
        [
            self.category.clone(),
            self.total.to_string(),
            self.has_image.to_string(),
            self.excluded.to_string(),
            format!("{:.3}", self.elapsed.as_secs_f64()),
        ]
    }
}

/// Check each member for a representative image. Missing pages and lookup
/// failures are logged and left out.
pub async fn check_pages<P: SubjectProvider>(provider: &P, members: &[SubjectRef]) -> Vec<PagePresence> {
    let pb = ProgressBar::new(members.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut rows = Vec::with_capacity(members.len());
    for subject in members {
        pb.inc(1);
        let page = match provider.fetch_page(subject).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                warn!("{}: no such page", subject);
                continue;
            }
            Err(e) => {
                warn!("{}: {}", subject, e);
                continue;
            }
        };
        match provider.get_representative_image(&page).await {
            Ok(image) => rows.push(PagePresence {
                title: page.title,
                has_image: image.is_some(),
            }),
            Err(e) => warn!("{}: {}", page.title, e),
        }
    }
    pb.finish_and_clear();
    rows
}

/// Write `<dir>/<category>.csv` and append the summary line to `info.csv`.
pub fn write_survey(
    dir: &Path,
    category: &str,
    rows: &[PagePresence],
    excluded: usize,
    elapsed: Duration,
) -> Result<SurveySummary> {
    let mut out = csv::create(dir, category, &PAGES_HEADER)?;
    for row in rows {
        let flag = if row.has_image { "True" } else { "False" };
        out.write_row(&[row.title.as_str(), flag])?;
    }
    out.flush()?;

    let summary = SurveySummary {
        category: category.trim_start_matches("Category:").to_string(),
        total: rows.len(),
        has_image: rows.iter().filter(|r| r.has_image).count(),
        excluded,
        elapsed,
    };
    csv::append_row(&dir.join(INFO_FILE), &INFO_HEADER, &summary.info_row())?;
    info!(
        "{}: {}/{} pages have an image ({:.2}%), {} excluded, {:.1}s",
        summary.category,
        summary.has_image,
        summary.total,
        summary.percent(),
        summary.excluded,
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

/// `2000..2020` → `(category, exclusion)` pairs for every `<year> deaths`
/// category, newest first.
pub fn deaths_categories(range: &str) -> Result<Vec<(String, String)>> {
    let Some((from, to)) = range.split_once("..") else {
        bail!("Expected a year range like 2000..2020, got {:?}", range);
    };
    let from: i32 = from.trim().parse().with_context(|| format!("Bad year {:?}", from))?;
    let to: i32 = to.trim().parse().with_context(|| format!("Bad year {:?}", to))?;
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    Ok((lo..=hi)
        .rev()
        .map(|year| (format!("{} deaths", year), year.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;

    #[tokio::test]
    async fn presence_per_page() {
        let provider = FakeProvider::new()
            .page(1, "Jane Doe", Some("J.jpg"))
            .page(2, "John Roe", None)
            .failing("Broken");
        let members = vec![
            SubjectRef::Title("Jane Doe".into()),
            SubjectRef::Title("Broken".into()),
            SubjectRef::Title("Nobody".into()),
            SubjectRef::Title("John Roe".into()),
        ];

        let rows = check_pages(&provider, &members).await;
        assert_eq!(
            rows,
            vec![
                PagePresence { title: "Jane Doe".into(), has_image: true },
                PagePresence { title: "John Roe".into(), has_image: false },
            ]
        );
        assert_eq!(provider.calls("get_knowledge_base_item"), 0);
    }

    #[test]
    fn writes_category_and_info_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("csvs");
        let rows = vec![
            PagePresence { title: "A, B".into(), has_image: true },
            PagePresence { title: "C".into(), has_image: false },
        ];

        let first = write_survey(&dir, "Category:2020 deaths", &rows, 3, Duration::from_millis(1500)).unwrap();
        assert_eq!(first.category, "2020 deaths");
        assert_eq!(first.has_image, 1);
        assert!((first.percent() - 50.0).abs() < f64::EPSILON);
        write_survey(&dir, "2019 deaths", &rows[..1], 0, Duration::from_secs(2)).unwrap();

        let pages = std::fs::read_to_string(dir.join("2020 deaths.csv")).unwrap();
        assert_eq!(pages, "Pagename,hasImage(bool)\n\"A, B\",True\nC,False\n");

        let info = std::fs::read_to_string(dir.join(INFO_FILE)).unwrap();
        let lines: Vec<&str> = info.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "category,total_pages,has_image,excluded,time_seconds");
        assert_eq!(lines[1], "2020 deaths,2,1,3,1.500");
        assert_eq!(lines[2], "2019 deaths,1,1,0,2.000");
    }

    #[test]
    fn year_ranges() {
        let cats = deaths_categories("2018..2020").unwrap();
        assert_eq!(
            cats,
            vec![
                ("2020 deaths".to_string(), "2020".to_string()),
                ("2019 deaths".to_string(), "2019".to_string()),
                ("2018 deaths".to_string(), "2018".to_string()),
            ]
        );
        assert_eq!(deaths_categories("2020..2020").unwrap().len(), 1);
        assert_eq!(deaths_categories("2020..2018").unwrap().len(), 3);
        assert!(deaths_categories("2020").is_err());
        assert!(deaths_categories("x..2020").is_err());
    }

    #[test]
    fn empty_survey_percent() {
        let s = SurveySummary {
            category: "Empty".into(),
            total: 0,
            has_image: 0,
            excluded: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(s.percent(), 0.0);
    }
}
