use std::collections::BTreeMap;

use serde_json::Value;

/// Knowledge-base property codes the extractors read.
pub mod property {
    pub const SEX: u32 = 21;
    pub const BIRTH_DATE: u32 = 569;
    pub const DEATH_DATE: u32 = 570;

    /// Item-valued properties whose targets need a display label.
    pub const LABELLED: &[u32] = &[SEX];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    /// Reference to another item, with its label once resolved.
    Item { id: String, label: Option<String> },
    /// Wikibase time value, e.g. `+1952-03-11T00:00:00Z`.
    Time { time: String, precision: u8 },
    /// `somevalue` / `novalue` snaks: the claim exists but has no target.
    NoTarget,
    /// Any other datavalue type, kept by name for diagnostics.
    Other(String),
}

/// Property → values view of one knowledge-base item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    pub item_id: String,
    claims: BTreeMap<u32, Vec<ClaimValue>>,
}

impl ClaimSet {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with(mut self, property: u32, value: ClaimValue) -> Self {
        self.push(property, value);
        self
    }

    pub fn push(&mut self, property: u32, value: ClaimValue) {
        self.claims.entry(property).or_default().push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// First value of `property`; further values are ignored.
    pub fn first(&self, property: u32) -> Option<&ClaimValue> {
        self.claims.get(&property).and_then(|v| v.first())
    }

    /// Item ids targeted by the first value of each of `properties`.
    pub fn item_targets(&self, properties: &[u32]) -> Vec<String> {
        properties
            .iter()
            .filter_map(|p| match self.first(*p) {
                Some(ClaimValue::Item { id, .. }) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Attach a display label to every item value that targets `id`.
    pub fn set_label(&mut self, id: &str, label: &str) {
        for value in self.claims.values_mut().flatten() {
            if let ClaimValue::Item { id: target, label: slot } = value {
                if target == id {
                    *slot = Some(label.to_string());
                }
            }
        }
    }

    /// Decode the `claims` object of a `wbgetentities` entity.
    pub fn from_entity(item_id: &str, entity: &Value) -> Self {
        let mut set = ClaimSet::new(item_id);
        let Some(claims) = entity.get("claims").and_then(Value::as_object) else {
            return set;
        };

        for (key, statements) in claims {
            let Some(property) = key.strip_prefix('P').and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            for statement in statements.as_array().into_iter().flatten() {
                set.push(property, decode_snak(&statement["mainsnak"]));
            }
        }
        set
    }
}

fn decode_snak(snak: &Value) -> ClaimValue {
    if snak.get("snaktype").and_then(Value::as_str) != Some("value") {
        return ClaimValue::NoTarget;
    }
    let datavalue = &snak["datavalue"];
    let value = &datavalue["value"];
    match datavalue.get("type").and_then(Value::as_str) {
        Some("wikibase-entityid") => match value.get("id").and_then(Value::as_str) {
            Some(id) => ClaimValue::Item {
                id: id.to_string(),
                label: None,
            },
            None => ClaimValue::Other("wikibase-entityid without id".into()),
        },
        Some("time") => match value.get("time").and_then(Value::as_str) {
            Some(time) => ClaimValue::Time {
                time: time.to_string(),
                precision: value
                    .get("precision")
                    .and_then(Value::as_u64)
                    .unwrap_or(11) as u8,
            },
            None => ClaimValue::Other("time without timestamp".into()),
        },
        Some(other) => ClaimValue::Other(other.to_string()),
        None => ClaimValue::NoTarget,
    }
}
