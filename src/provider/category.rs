use tracing::{debug, info};

use super::mediawiki::{MediaWikiProvider, ProviderError};
use super::SubjectRef;
use crate::record::Site;

pub const DEFAULT_SORTKEY: &str = "!ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_PAGE: usize = 500;

/// How to draw a sample from a category.
#[derive(Debug, Clone)]
pub struct Sampling {
    /// Members taken per sort-key prefix.
    pub sample_size: usize,
    pub sortkey: String,
    /// Drop members whose title contains this text.
    pub exclude: Option<String>,
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling {
            sample_size: 50,
            sortkey: DEFAULT_SORTKEY.to_string(),
            exclude: None,
        }
    }
}

impl Sampling {
    pub fn max_members(&self) -> usize {
        self.sortkey.chars().count() * self.sample_size
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategorySample {
    pub members: Vec<SubjectRef>,
    pub excluded: usize,
}

/// `Living people` → `Category:Living people`.
pub fn category_title(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("Category:") {
        name.to_string()
    } else {
        format!("Category:{}", name)
    }
}

/// One `(start, end)` sort-key prefix range per character of `sortkey`;
/// each range ends where the next one starts, the last is open.
pub fn prefix_ranges(sortkey: &str) -> Vec<(String, Option<String>)> {
    let chars: Vec<char> = sortkey.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| (c.to_string(), chars.get(i + 1).map(|n| n.to_string())))
        .collect()
}

/// Apply the exclusion filter, keeping order.
pub fn exclude_titles(titles: Vec<String>, exclude: Option<&str>) -> CategorySample {
    let mut sample = CategorySample::default();
    for title in titles {
        match exclude {
            Some(ex) if title.contains(ex) => sample.excluded += 1,
            _ => sample.members.push(SubjectRef::Title(title)),
        }
    }
    sample
}

impl MediaWikiProvider {
    /// Article titles in `category` whose sort key lies in `[start, end)`.
    pub async fn category_members(
        &self,
        category: &str,
        start: &str,
        end: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let title = category_title(category);
        let mut titles = Vec::new();
        let mut cont: Option<String> = None;

        while titles.len() < limit {
            let batch = (limit - titles.len()).min(MAX_PAGE).to_string();
            let mut params = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", title.as_str()),
                ("cmnamespace", "0"),
                ("cmtype", "page"),
                ("cmlimit", batch.as_str()),
                ("cmstartsortkeyprefix", start),
            ];
            if let Some(end) = end {
                params.push(("cmendsortkeyprefix", end));
            }
            if let Some(c) = &cont {
                params.push(("cmcontinue", c.as_str()));
            }

            let response = self.query(Site::Local, &params).await?;
            titles.extend(response.query.categorymembers.into_iter().map(|m| m.title));

            cont = response
                .cont
                .as_ref()
                .and_then(|c| c.get("cmcontinue"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            if cont.is_none() {
                break;
            }
        }

        titles.truncate(limit);
        debug!("{} [{}..{:?}): {} members", title, start, end, titles.len());
        Ok(titles)
    }

    /// Up to `sample_size` members for every sort-key prefix.
    pub async fn sample_category(
        &self,
        category: &str,
        sampling: &Sampling,
    ) -> Result<CategorySample, ProviderError> {
        let mut titles = Vec::new();
        for (start, end) in prefix_ranges(&sampling.sortkey) {
            let members = self
                .category_members(category, &start, end.as_deref(), sampling.sample_size)
                .await?;
            titles.extend(members);
        }
        let sample = exclude_titles(titles, sampling.exclude.as_deref());
        info!(
            "Sampled {} pages from {} ({} excluded)",
            sample.members.len(),
            category_title(category),
            sample.excluded
        );
        Ok(sample)
    }

    /// Total number of pages in `category`.
    pub async fn category_size(&self, category: &str) -> Result<Option<u64>, ProviderError> {
        let title = category_title(category);
        let response = self
            .query(
                Site::Local,
                &[("action", "query"), ("prop", "categoryinfo"), ("titles", title.as_str())],
            )
            .await?;
        Ok(response
            .query
            .pages
            .into_iter()
            .next()
            .and_then(|p| p.categoryinfo)
            .map(|info| info.pages))
    }
}
