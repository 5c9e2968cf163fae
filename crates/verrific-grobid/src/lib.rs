//! PDF to TEI conversion through a [GROBID](https://grobid.readthedocs.io/) server.
//!
//! [`GrobidClient::check_alive`] polls the liveness endpoint, [`GrobidClient::process_pdf`]
//! uploads a single PDF, and [`GrobidClient::convert_batch`] converts many PDFs while
//! recording, rather than propagating, per-file failures.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod client;
mod convert;

pub use client::GrobidClient;
pub use convert::{BatchEvent, BatchReport, OutputTarget, collect_pdfs};

pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

/// Connection and processing options for a GROBID server.
#[derive(Debug, Clone)]
pub struct GrobidConfig {
    pub url: String,
    /// First page to process; -1 for the whole document.
    pub start: i32,
    /// Last page to process; -1 for the whole document.
    pub end: i32,
    /// Let GROBID fix up citations against an external bibliographic service.
    pub consolidate_citations: bool,
    pub consolidate_header: bool,
    pub consolidate_funders: bool,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_wait: Duration,
    /// Per-request timeout. Full-text processing of long papers is slow.
    pub timeout: Duration,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GROBID_URL.to_string(),
            start: -1,
            end: -1,
            consolidate_citations: false,
            consolidate_header: false,
            consolidate_funders: false,
            max_attempts: 3,
            retry_wait: Duration::from_secs(2),
            timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Error, Debug)]
pub enum GrobidError {
    #[error("GROBID server {url} is not available: {reason}")]
    Unavailable { url: String, reason: String },
    #[error("PDF not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl GrobidError {
    /// Whether another attempt could succeed. GROBID answers 503 when its
    /// worker pool is saturated.
    pub fn is_transient(&self) -> bool {
        match self {
            GrobidError::Transport(_) => true,
            GrobidError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
