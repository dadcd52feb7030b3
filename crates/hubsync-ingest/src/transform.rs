//! Normalization of registry items into sink records

use crate::models::{CategorySlots, Record, RepositoryItem, UNCATEGORIZED};
use crate::sources::Source;

const KB: i64 = 1 << 10;
const MB: i64 = 1 << 20;
const GB: i64 = 1 << 30;

/// Render a byte count with base-1024 units and two decimals
///
/// Below one kibibyte the raw count is kept: `500` becomes `"500 Bytes"`.
pub fn format_storage_size(bytes: i64) -> String {
    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{} Bytes", b),
    }
}

/// Display string and bounded slots for a list of category names
pub fn derive_categories(names: &[String]) -> (String, CategorySlots) {
    if names.is_empty() {
        return (UNCATEGORIZED.to_string(), CategorySlots::default());
    }
    (names.join(", "), CategorySlots::from_names(names.iter().cloned()))
}

/// Turn one registry item into a record labelled with the source's tier
pub fn normalize(item: RepositoryItem, source: &Source) -> Record {
    let names: Vec<String> = item.categories.into_iter().map(|c| c.name).collect();
    let (category, categories) = derive_categories(&names);

    Record {
        storage_size: format_storage_size(item.storage_size),
        storage_bytes: item.storage_size,
        name: item.name,
        namespace: item.namespace,
        description: item.description,
        pull_count: item.pull_count,
        star_count: item.star_count,
        is_private: item.is_private,
        last_updated: item.last_updated,
        media_types: item.media_types,
        content_types: item.content_types,
        category,
        categories,
        image_type: source.tier.label().to_string(),
    }
}
