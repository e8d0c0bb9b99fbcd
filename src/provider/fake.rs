use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::{ImageHandle, PageHandle, SubjectProvider, SubjectRef};
use crate::claims::ClaimSet;
use crate::record::Site;

#[derive(Error, Debug)]
#[error("fake provider failure: {0}")]
pub struct FakeError(pub String);

/// In-memory provider that records how often each method is called.
#[derive(Default)]
pub struct FakeProvider {
    pages: Vec<PageHandle>,
    local_files: HashSet<String>,
    markup: HashMap<String, String>,
    items: HashMap<i64, ClaimSet>,
    failing: HashSet<String>,
    calls: RefCell<HashMap<&'static str, usize>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page_id: i64, title: &str, image: Option<&str>) -> Self {
        self.pages.push(PageHandle {
            page_id,
            title: title.to_string(),
            latest_revision: Some(1000 + page_id as u64),
            page_image: image.map(str::to_string),
            item_id: Some(format!("Q{}", page_id)),
        });
        self
    }

    pub fn local_file(mut self, file: &str) -> Self {
        self.local_files.insert(file.to_string());
        self
    }

    pub fn markup(mut self, file: &str, text: &str) -> Self {
        self.markup.insert(file.to_string(), text.to_string());
        self
    }

    pub fn item(mut self, page_id: i64, claims: ClaimSet) -> Self {
        self.items.insert(page_id, claims);
        self
    }

    /// Make every lookup of `title` fail.
    pub fn failing(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.borrow().get(method).copied().unwrap_or(0)
    }

    fn hit(&self, method: &'static str) {
        *self.calls.borrow_mut().entry(method).or_default() += 1;
    }
}

impl SubjectProvider for FakeProvider {
    type Error = FakeError;

    async fn fetch_page(&self, subject: &SubjectRef) -> Result<Option<PageHandle>, FakeError> {
        self.hit("fetch_page");
        if let SubjectRef::Title(t) = subject {
            if self.failing.contains(t) {
                return Err(FakeError(t.clone()));
            }
        }
        Ok(self
            .pages
            .iter()
            .find(|p| match subject {
                SubjectRef::Title(t) => &p.title == t,
                SubjectRef::PageId(id) => p.page_id == *id,
            })
            .cloned())
    }

    async fn get_representative_image(
        &self,
        page: &PageHandle,
    ) -> Result<Option<ImageHandle>, FakeError> {
        self.hit("get_representative_image");
        Ok(page.page_image.as_ref().map(|title| ImageHandle {
            title: title.clone(),
            site: Site::Local,
        }))
    }

    async fn image_exists_on_site(&self, image: &ImageHandle, site: Site) -> Result<bool, FakeError> {
        self.hit("image_exists_on_site");
        Ok(match site {
            Site::Local => self.local_files.contains(&image.title),
            Site::Shared => !self.local_files.contains(&image.title),
        })
    }

    async fn get_file_url(&self, image: &ImageHandle) -> Result<String, FakeError> {
        self.hit("get_file_url");
        let host = match image.site {
            Site::Local => "en",
            Site::Shared => "commons",
        };
        Ok(format!("https://upload.example.org/{}/{}", host, image.title))
    }

    async fn get_permalink(&self, page: &PageHandle) -> Result<String, FakeError> {
        self.hit("get_permalink");
        Ok(format!(
            "https://en.example.org/w/index.php?title={}&oldid={}",
            page.title.replace(' ', "_"),
            page.latest_revision.unwrap_or_default()
        ))
    }

    async fn get_raw_markup(&self, image: &ImageHandle) -> Result<String, FakeError> {
        self.hit("get_raw_markup");
        Ok(self.markup.get(&image.title).cloned().unwrap_or_default())
    }

    async fn get_knowledge_base_item(&self, page: &PageHandle) -> Result<Option<ClaimSet>, FakeError> {
        self.hit("get_knowledge_base_item");
        Ok(self.items.get(&page.page_id).cloned())
    }
}
