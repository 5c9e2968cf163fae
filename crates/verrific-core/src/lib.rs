use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod config_file;
pub mod enrich;
pub mod extract;
pub mod lookup;
pub mod tei;

// Re-export for convenience
pub use enrich::{
    DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT, EnrichError, EnrichEvent, EnrichOptions, EnrichStats,
    enrich_references, enrich_with_glutton,
};
pub use extract::{
    ExtractError, extract_references, extract_references_from_bytes, extract_references_from_str,
};
pub use lookup::{LookupError, LookupQuery, LookupService};
pub use lookup::glutton::GluttonClient;

/// Key under which a failed enrichment stores its reason.
pub const ERROR_KEY: &str = "_error";

/// Failure reason recorded when the lookup service answers with a JSON `null`.
pub const EMPTY_RESPONSE: &str = "Empty response from biblio-glutton";

/// Upper bound (in characters) for a reference's raw citation text.
pub const MAX_RAW_CHARS: usize = 500;

/// Metadata attached to a reference by the enricher.
///
/// Serialises to the lookup body itself, or to `{"_error": reason}` for failures,
/// so exported JSON keeps the marker convention used by the lookup service.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// The lookup service answered with a record.
    Matched(serde_json::Value),
    /// The lookup failed; the string says why.
    Failed(String),
}

impl Enrichment {
    /// Classify a JSON value, treating any object carrying [`ERROR_KEY`] as a failure.
    ///
    /// A `null` body carries no record and is a failure ([`EMPTY_RESPONSE`]).
    pub fn from_json(value: serde_json::Value) -> Self {
        if value.is_null() {
            return Enrichment::Failed(EMPTY_RESPONSE.to_string());
        }
        match value.get(ERROR_KEY) {
            Some(serde_json::Value::String(reason)) => Enrichment::Failed(reason.clone()),
            Some(other) => Enrichment::Failed(other.to_string()),
            None => Enrichment::Matched(value),
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Enrichment::Matched(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Enrichment::Failed(reason) => Some(reason),
            Enrichment::Matched(_) => None,
        }
    }

    /// The marker-convention JSON form of this enrichment.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Enrichment::Matched(value) => value.clone(),
            Enrichment::Failed(reason) => serde_json::json!({ ERROR_KEY: reason }),
        }
    }
}

impl Serialize for Enrichment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Enrichment::Matched(value) => value.serialize(serializer),
            Enrichment::Failed(reason) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(ERROR_KEY, reason)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Enrichment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Enrichment::from_json)
    }
}

/// A bibliographic reference extracted from a TEI document.
///
/// Everything except the enrichment is fixed at construction. Fields that are
/// blank after trimming are stored as absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    doi: Option<String>,
    title: Option<String>,
    first_author_surname: Option<String>,
    raw: Option<String>,
    enrichment: Option<Enrichment>,
}

impl Reference {
    pub fn new(
        doi: Option<String>,
        title: Option<String>,
        first_author_surname: Option<String>,
        raw: Option<String>,
    ) -> Self {
        Self {
            doi: clean(doi),
            title: clean(title),
            first_author_surname: clean(first_author_surname),
            raw: clean(raw).map(|r| truncate_chars(&r, MAX_RAW_CHARS)),
            enrichment: None,
        }
    }

    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn first_author_surname(&self) -> Option<&str> {
        self.first_author_surname.as_deref()
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn enrichment(&self) -> Option<&Enrichment> {
        self.enrichment.as_ref()
    }

    /// Replace the enrichment. Re-running the enricher overwrites, never appends.
    pub fn set_enrichment(&mut self, enrichment: Enrichment) {
        self.enrichment = Some(enrichment);
    }

    /// Enriched with a record rather than an error marker.
    pub fn is_matched(&self) -> bool {
        self.enrichment.as_ref().is_some_and(Enrichment::is_matched)
    }

    /// Stable de-duplication key.
    ///
    /// `doi:<lower-cased doi>` when a DOI exists, otherwise the lower-cased
    /// surname, title and raw text joined by `|`, skipping absent parts.
    pub fn key(&self) -> String {
        if let Some(doi) = &self.doi {
            return format!("doi:{}", doi.trim().to_lowercase());
        }
        [&self.first_author_surname, &self.title, &self.raw]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_lowercase())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Group indices of references sharing a [`Reference::key`].
///
/// Only groups with more than one member are returned, ordered by first occurrence.
/// References with an empty key are never grouped.
pub fn find_duplicates(refs: &[Reference]) -> Vec<Vec<usize>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    for (i, reference) in refs.iter().enumerate() {
        let key = reference.key();
        if key.is_empty() {
            continue;
        }
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(i);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter(|group| group.len() > 1)
        .collect()
}

/// First `max` characters of `s` (character count, not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
