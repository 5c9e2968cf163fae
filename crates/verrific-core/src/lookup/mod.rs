//! Lookup backends that resolve partial reference metadata to canonical records.

pub mod glutton;
#[cfg(test)]
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::Reference;

/// Boxed future returned by [`LookupService::lookup`].
pub type LookupResult<'a> =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, LookupError>> + Send + 'a>>;

/// Why a single lookup produced no record. The display strings are what ends
/// up in a reference's failure marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The service answered 200 but the body was not JSON.
    #[error("Invalid JSON from biblio-glutton")]
    InvalidJson,
    /// Any non-200 answer, including "no match" (404).
    #[error("HTTP {0}")]
    Status(u16),
    /// Timeout, refused connection, broken body and the like.
    #[error("{0}")]
    Transport(String),
}

/// What to ask the lookup service for a given reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    Doi(String),
    Metadata {
        title: Option<String>,
        first_author: Option<String>,
    },
}

impl LookupQuery {
    /// DOI alone when present, else title and/or surname. `None` when the
    /// reference carries nothing worth querying.
    pub fn for_reference(reference: &Reference) -> Option<Self> {
        if let Some(doi) = reference.doi() {
            return Some(LookupQuery::Doi(doi.to_string()));
        }
        let title = reference.title().map(String::from);
        let first_author = reference.first_author_surname().map(String::from);
        if title.is_none() && first_author.is_none() {
            return None;
        }
        Some(LookupQuery::Metadata {
            title,
            first_author,
        })
    }

    /// Query-string pairs. Absent fields are omitted, never sent empty.
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        match self {
            LookupQuery::Doi(doi) => vec![("doi", doi.as_str())],
            LookupQuery::Metadata {
                title,
                first_author,
            } => {
                let mut params = Vec::with_capacity(2);
                if let Some(title) = title {
                    params.push(("atitle", title.as_str()));
                }
                if let Some(author) = first_author {
                    params.push(("firstAuthor", author.as_str()));
                }
                params
            }
        }
    }
}

/// A service that can resolve one query to a metadata record.
pub trait LookupService: Send + Sync {
    /// Name used in logs (e.g. "biblio-glutton").
    fn name(&self) -> &str;

    /// Resolve `query`, giving up after `timeout`.
    fn lookup<'a>(&'a self, query: &'a LookupQuery, timeout: Duration) -> LookupResult<'a>;
}
