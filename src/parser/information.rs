use std::collections::HashMap;

use super::templates::parse_templates;

const INFORMATION: &str = "Information";

/// Key/value view of the `{{Information}}` template on a file description page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InformationBlock {
    pub template: String,
    params: HashMap<String, String>,
}

impl InformationBlock {
    pub fn new(template: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            template: template.into(),
            params,
        }
    }

    /// Look `key` up as written, then all-lowercase.
    /// `get("Date")` tries `Date` and then `date`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .or_else(|| self.params.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    pub fn date(&self) -> Option<&str> {
        self.get("Date")
    }

    pub fn description(&self) -> Option<&str> {
        self.get("Description")
    }
}

/// Build an [`InformationBlock`] from the first template whose name contains
/// `Information`. Later matches are ignored. `None` when there is no match.
pub fn parse_information_block(markup: &str) -> Option<InformationBlock> {
    let template = parse_templates(markup)
        .into_iter()
        .find(|t| t.name.contains(INFORMATION))?;

    // Repeated names keep the last value.
    let params = template
        .params
        .into_iter()
        .map(|p| (p.name, p.value))
        .collect();

    Some(InformationBlock::new(template.name, params))
}
