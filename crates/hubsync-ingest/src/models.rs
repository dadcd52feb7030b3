//! Wire types returned by the registry and the normalized record written to the sink

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Most category slots a record carries into storage
pub const MAX_CATEGORY_SLOTS: usize = 4;

/// Display value for a repository with no categories
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One page of `GET <base>/<namespace>/`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<RepositoryItem>,
}

impl Page {
    /// Cursor for the following page; `None` on the last page
    pub fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref().map(str::trim).filter(|next| !next.is_empty())
    }
}

/// A repository as the registry reports it
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RepositoryItem {
    pub name: String,
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pull_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub star_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    /// `None` when absent, empty or not a recognizable timestamp
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub storage_size: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<RepositoryCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryCategory {
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A bad timestamp on one repository must not fail the page it came in
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(str::trim).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Zone-less values are taken as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ordered category names, at most [`MAX_CATEGORY_SLOTS`] long
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySlots(Vec<String>);

impl CategorySlots {
    /// Keep the first four names; later ones are dropped
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .take(MAX_CATEGORY_SLOTS)
                .map(Into::into)
                .collect(),
        )
    }

    /// Slot `index` (0-based), `None` when unset
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The four fixed `category1..category4` columns
    pub fn columns(&self) -> [Option<&str>; MAX_CATEGORY_SLOTS] {
        std::array::from_fn(|i| self.get(i))
    }
}

/// A repository ready for the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub namespace: String,
    pub description: String,
    pub pull_count: i64,
    pub star_count: i64,
    pub is_private: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub media_types: Vec<String>,
    pub content_types: Vec<String>,
    /// Raw size in bytes as reported upstream
    pub storage_bytes: i64,
    /// `storage_bytes` rendered for humans, e.g. "5.00 MB"
    pub storage_size: String,
    /// All category names joined with ", ", or [`UNCATEGORIZED`]
    pub category: String,
    pub categories: CategorySlots,
    pub image_type: String,
}

impl Record {
    /// Natural key used for conflict detection
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.namespace)
    }
}
