use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::{ImageHandle, PageHandle, SubjectProvider, SubjectRef};
use crate::claims::{property, ClaimSet};
use crate::config::Settings;
use crate::record::Site;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid endpoint {0}")]
    Endpoint(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Live provider over the MediaWiki Action API (article wiki and shared
/// media repository) and the Wikibase API.
pub struct MediaWikiProvider {
    client: Client,
    local: Url,
    shared: Url,
    kb: Url,
    language: String,
    retry: RetryPolicy,
}

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff for rate limits and server errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based) after `status`, or `None`
    /// when the failure is final.
    pub(crate) fn delay(&self, status: StatusCode, retry: u32) -> Option<Duration> {
        if !is_retryable(status) || retry == 0 || retry > self.max_retries {
            return None;
        }
        Some(backoff_delay(self.backoff, retry - 1))
    }
}

// ── Response shapes (formatversion=2) ──

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub query: Query,
    #[serde(rename = "continue")]
    pub cont: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Query {
    #[serde(default)]
    pub pages: Vec<ApiPage>,
    #[serde(default)]
    pub categorymembers: Vec<ApiMember>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPage {
    pub pageid: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    pub lastrevid: Option<u64>,
    pub pageimage: Option<String>,
    pub pageprops: Option<PageProps>,
    #[serde(default)]
    pub imageinfo: Vec<ImageInfo>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    pub categoryinfo: Option<CategoryInfo>,
}

impl ApiPage {
    fn exists(&self) -> bool {
        !self.missing && !self.invalid && self.pageid.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageProps {
    pub wikibase_item: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageInfo {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Revision {
    pub slots: Slots,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Slots {
    pub main: Slot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Slot {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryInfo {
    pub pages: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMember {
    pub title: String,
}

impl MediaWikiProvider {
    pub fn new(settings: &Settings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            local: parse_endpoint(&settings.local_api)?,
            shared: parse_endpoint(&settings.shared_api)?,
            kb: parse_endpoint(&settings.kb_api)?,
            language: settings.label_language.clone(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                backoff: Duration::from_millis(settings.backoff_ms),
            },
        })
    }

    fn endpoint(&self, site: Site) -> &Url {
        match site {
            Site::Local => &self.local,
            Site::Shared => &self.shared,
        }
    }

    /// GET `endpoint` with `params`, retrying rate limits and server errors
    /// with exponential backoff.
    pub(crate) async fn call(&self, endpoint: &Url, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let mut retry = 0u32;
        loop {
            let response = self
                .client
                .get(endpoint.clone())
                .query(&[("format", "json"), ("formatversion", "2")])
                .query(params)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let body: Value = response.json().await?;
                if let Some(err) = body.get("error") {
                    return Err(ProviderError::Api {
                        code: err["code"].as_str().unwrap_or("unknown").to_string(),
                        info: err["info"].as_str().unwrap_or_default().to_string(),
                    });
                }
                return Ok(body);
            }

            retry += 1;
            let Some(backoff) = self.retry.delay(status, retry) else {
                return Err(ProviderError::Status {
                    status,
                    url: response.url().to_string(),
                });
            };
            warn!(
                "HTTP {} from {}, retry {}/{} in {:.1}s",
                status,
                endpoint,
                retry,
                self.retry.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }
    }

    pub(crate) async fn query(&self, site: Site, params: &[(&str, &str)]) -> Result<QueryResponse, ProviderError> {
        let body = self.call(self.endpoint(site), params).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn file_page(&self, image: &ImageHandle, site: Site, prop: &[(&str, &str)]) -> Result<Option<ApiPage>, ProviderError> {
        let title = format!("File:{}", image.title);
        let mut params = vec![("action", "query"), ("titles", title.as_str())];
        params.extend_from_slice(prop);
        let response = self.query(site, &params).await?;
        Ok(response.query.pages.into_iter().next().filter(ApiPage::exists))
    }

    async fn resolve_labels(&self, claims: &mut ClaimSet) -> Result<(), ProviderError> {
        let targets = claims.item_targets(property::LABELLED);
        if targets.is_empty() {
            return Ok(());
        }
        let ids = targets.join("|");
        let body = self
            .call(
                &self.kb,
                &[
                    ("action", "wbgetentities"),
                    ("ids", ids.as_str()),
                    ("props", "labels"),
                    ("languages", self.language.as_str()),
                ],
            )
            .await?;

        for id in &targets {
            match body["entities"][id.as_str()]["labels"][self.language.as_str()]["value"].as_str() {
                Some(label) => claims.set_label(id, label),
                None => debug!("No {} label for {}", self.language, id),
            }
        }
        Ok(())
    }
}

/// Rate limits and server errors are worth another try.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `base · 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .map_or(MAX_BACKOFF, |factor| base.saturating_mul(factor))
        .min(MAX_BACKOFF)
}

fn parse_endpoint(url: &str) -> Result<Url, ProviderError> {
    Url::parse(url).map_err(|e| ProviderError::Endpoint(format!("{}: {}", url, e)))
}

/// `.../w/api.php` → `.../w/index.php?title=<title>&oldid=<revision>`.
pub(crate) fn permalink(api: &Url, title: &str, revision: Option<u64>) -> String {
    let mut url = api.clone();
    let path = url.path().replace("api.php", "index.php");
    url.set_path(&path);
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.append_pair("title", &title.replace(' ', "_"));
        if let Some(rev) = revision {
            query.append_pair("oldid", &rev.to_string());
        }
    }
    url.to_string()
}

impl SubjectProvider for MediaWikiProvider {
    type Error = ProviderError;

    async fn fetch_page(&self, subject: &SubjectRef) -> Result<Option<PageHandle>, ProviderError> {
        let (key, value) = match subject {
            SubjectRef::Title(t) => ("titles", t.clone()),
            SubjectRef::PageId(id) => ("pageids", id.to_string()),
        };
        let response = self
            .query(
                Site::Local,
                &[
                    ("action", "query"),
                    ("prop", "info|pageimages|pageprops"),
                    ("piprop", "name"),
                    ("ppprop", "wikibase_item"),
                    (key, value.as_str()),
                ],
            )
            .await?;

        let page = response.query.pages.into_iter().next().filter(ApiPage::exists);
        Ok(page.and_then(|p| {
            Some(PageHandle {
                page_id: p.pageid?,
                title: p.title,
                latest_revision: p.lastrevid,
                page_image: p.pageimage,
                item_id: p.pageprops.and_then(|pp| pp.wikibase_item),
            })
        }))
    }

    async fn get_representative_image(&self, page: &PageHandle) -> Result<Option<ImageHandle>, ProviderError> {
        Ok(page.page_image.as_ref().map(|title| ImageHandle {
            title: title.replace('_', " "),
            site: Site::Local,
        }))
    }

    async fn image_exists_on_site(&self, image: &ImageHandle, site: Site) -> Result<bool, ProviderError> {
        // A shared-repository file shows up as missing (but known) locally.
        let page = self.file_page(image, site, &[("prop", "info")]).await?;
        Ok(page.is_some())
    }

    async fn get_file_url(&self, image: &ImageHandle) -> Result<String, ProviderError> {
        let page = self
            .file_page(image, image.site, &[("prop", "imageinfo"), ("iiprop", "url")])
            .await?;
        page.and_then(|p| p.imageinfo.into_iter().next())
            .map(|info| info.url)
            .ok_or_else(|| ProviderError::Unexpected(format!("no file URL for File:{}", image.title)))
    }

    async fn get_permalink(&self, page: &PageHandle) -> Result<String, ProviderError> {
        Ok(permalink(&self.local, &page.title, page.latest_revision))
    }

    async fn get_raw_markup(&self, image: &ImageHandle) -> Result<String, ProviderError> {
        let page = self
            .file_page(
                image,
                image.site,
                &[("prop", "revisions"), ("rvprop", "content"), ("rvslots", "main")],
            )
            .await?;
        page.and_then(|p| p.revisions.into_iter().next())
            .map(|rev| rev.slots.main.content)
            .ok_or_else(|| ProviderError::Unexpected(format!("no revision for File:{}", image.title)))
    }

    async fn get_knowledge_base_item(&self, page: &PageHandle) -> Result<Option<ClaimSet>, ProviderError> {
        let Some(id) = &page.item_id else {
            return Ok(None);
        };
        let body = self
            .call(
                &self.kb,
                &[("action", "wbgetentities"), ("ids", id.as_str()), ("props", "claims")],
            )
            .await?;

        let entity = &body["entities"][id.as_str()];
        if entity.is_null() || entity.get("missing").is_some() {
            return Ok(None);
        }

        let mut claims = ClaimSet::from_entity(id, entity);
        self.resolve_labels(&mut claims).await?;
        Ok(Some(claims))
    }
}
