//! Remote access to pages, files and knowledge-base items.
//!
//! The extraction pipeline only talks to a [`SubjectProvider`]; the live
//! implementation is [`MediaWikiProvider`], tests use an in-memory fake.

pub mod category;
pub mod mediawiki;

#[cfg(test)]
pub mod fake;

use std::fmt;

use crate::claims::ClaimSet;
use crate::record::Site;

pub use mediawiki::MediaWikiProvider;

/// How a subject is named when it is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRef {
    Title(String),
    PageId(i64),
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Title(t) => f.write_str(t),
            SubjectRef::PageId(id) => write!(f, "#{}", id),
        }
    }
}

/// An existing article, as returned by [`SubjectProvider::fetch_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHandle {
    pub page_id: i64,
    pub title: String,
    pub latest_revision: Option<u64>,
    /// Representative image file name, without namespace.
    pub page_image: Option<String>,
    /// Linked knowledge-base item id, e.g. `Q42`.
    pub item_id: Option<String>,
}

/// A file on a specific site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    /// File name without namespace.
    pub title: String,
    pub site: Site,
}

/// Everything the pipeline needs from the outside world. Each call is one
/// remote lookup; absence is `Ok(None)`, not an error.
#[allow(async_fn_in_trait)]
pub trait SubjectProvider {
    type Error: std::error::Error;

    async fn fetch_page(&self, subject: &SubjectRef) -> Result<Option<PageHandle>, Self::Error>;

    /// The page's representative image, addressed on the page's own site.
    async fn get_representative_image(
        &self,
        page: &PageHandle,
    ) -> Result<Option<ImageHandle>, Self::Error>;

    async fn image_exists_on_site(&self, image: &ImageHandle, site: Site)
        -> Result<bool, Self::Error>;

    async fn get_file_url(&self, image: &ImageHandle) -> Result<String, Self::Error>;

    async fn get_permalink(&self, page: &PageHandle) -> Result<String, Self::Error>;

    async fn get_raw_markup(&self, image: &ImageHandle) -> Result<String, Self::Error>;

    async fn get_knowledge_base_item(
        &self,
        page: &PageHandle,
    ) -> Result<Option<ClaimSet>, Self::Error>;
}
