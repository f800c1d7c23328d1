//! Typed view of the checker's raw report payload.
//!
//! The checker returns loosely-shaped JSON whose layout has drifted between
//! service versions. Rather than poking at untyped maps, the payload is parsed
//! into [`RawReport`], whose last variant captures any shape we do not
//! recognise so normalization can report it instead of silently reading
//! missing keys.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

/// The category → entries structure of a completed check.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawReport {
    /// `[{"category": "Fonts", "errorInfo": [...]}, ...]`. Elements stay raw
    /// so one malformed category cannot hide the others.
    Categories(Vec<Value>),
    /// `{"Document": [...], "Fonts": [...]}`, key order as sent by the service.
    Grouped(serde_json::Map<String, Value>),
    /// Anything else.
    Unrecognized(Value),
}

impl RawReport {
    /// Flatten into `(category, entries)` pairs in service order.
    ///
    /// Returns `None` for [`RawReport::Unrecognized`]. In either layout a
    /// malformed category contributes nothing and a malformed entry is
    /// skipped without affecting its neighbours.
    pub fn categories(&self) -> Option<Vec<(String, Vec<RawEntry>)>> {
        match self {
            RawReport::Categories(list) => Some(
                list.iter()
                    .filter_map(|value| {
                        match serde_json::from_value::<RawCategory>(value.clone()) {
                            Ok(c) => Some((c.category, c.error_info)),
                            Err(e) => {
                                warn!("Skipping malformed checker category: {}", e);
                                None
                            }
                        }
                    })
                    .collect(),
            ),
            RawReport::Grouped(map) => Some(
                map.iter()
                    .map(|(name, value)| {
                        let entries = match value {
                            Value::Array(items) => entries_from(items),
                            other => {
                                warn!("Checker category '{}' is not an entry list: {}", name, other);
                                Vec::new()
                            }
                        };
                        (name.clone(), entries)
                    })
                    .collect(),
            ),
            RawReport::Unrecognized(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    #[serde(alias = "name", alias = "Category")]
    pub category: String,
    #[serde(
        rename = "errorInfo",
        alias = "errors",
        alias = "rules",
        default,
        deserialize_with = "lenient_entries"
    )]
    pub error_info: Vec<RawEntry>,
}

fn entries_from(items: &[Value]) -> Vec<RawEntry> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RawEntry>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping malformed checker entry {}: {}", item, e);
                None
            }
        })
        .collect()
}

/// A missing, `null` or non-list entry field reads as no entries.
fn lenient_entries<'de, D>(d: D) -> Result<Vec<RawEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => entries_from(&items),
        _ => Vec::new(),
    })
}

/// One rule result inside a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default, alias = "Rule", deserialize_with = "lenient_string")]
    pub rule: Option<String>,
    #[serde(default, alias = "Status", deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, alias = "Description")]
    pub description: Option<RawDescription>,
    #[serde(default, alias = "Error", deserialize_with = "lenient_string")]
    pub error: Option<String>,
    #[serde(default, alias = "Page", deserialize_with = "lenient_page")]
    pub page: Option<u32>,
    #[serde(
        default,
        rename = "wcagReference",
        alias = "wcag",
        deserialize_with = "lenient_string"
    )]
    pub wcag_reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDescription {
    QuestionsAndAnswers(Vec<QaPair>),
    Text(String),
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaPair {
    #[serde(alias = "Question")]
    pub question: String,
    #[serde(alias = "Answer")]
    pub answer: String,
}

fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Page numbers arrive as integers, numeric strings, or markers such as
/// `"document"`; anything non-numeric is treated as document-wide.
fn lenient_page<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
