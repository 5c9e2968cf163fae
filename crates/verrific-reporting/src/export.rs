use std::path::Path;

use serde::Serialize;
use verrific_core::{Enrichment, Reference};

use crate::summary::{SummaryStats, summarize};
use crate::{ExportError, ExportFormat};

/// Render `refs` in `format` and write the result to `path`.
pub fn export_summary(
    refs: &[Reference],
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    let content = render(refs, format)?;
    std::fs::write(path, content).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), ?format, count = refs.len(), "exported summary");
    Ok(())
}

/// Render `refs` in `format`.
pub fn render(refs: &[Reference], format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::Text => export_text(refs),
        ExportFormat::Csv => export_csv(refs),
        ExportFormat::Markdown => export_markdown(refs),
        ExportFormat::Json => export_json(refs)?,
    })
}

fn error_of(reference: &Reference) -> &str {
    reference
        .enrichment()
        .and_then(Enrichment::error)
        .unwrap_or("")
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn export_text(refs: &[Reference]) -> String {
    let stats = SummaryStats::from_references(refs);
    let mut out = String::new();
    for (i, (row, reference)) in summarize(refs).iter().zip(refs).enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, row.matched_indicator()));
        out.push_str(&format!("    DOI:    {}\n", or_dash(&row.doi)));
        out.push_str(&format!("    Title:  {}\n", or_dash(&row.title)));
        out.push_str(&format!("    Author: {}\n", or_dash(&row.first_author_surname)));
        out.push_str(&format!("    Raw:    {}\n", or_dash(&row.raw)));
        let error = error_of(reference);
        if !error.is_empty() {
            out.push_str(&format!("    Error:  {}\n", error));
        }
    }
    out.push_str(&format!("\n{}\n", "=".repeat(60)));
    out.push_str(&format!(
        "Total: {}  Matched: {}  Failed: {}  Not looked up: {}  Duplicates: {}\n",
        stats.total, stats.matched, stats.failed, stats.unenriched, stats.duplicates
    ));
    out
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn export_csv(refs: &[Reference]) -> String {
    let mut out = String::from("Ref#,DOI,Title,FirstAuthorSurname,Raw,Matched,Error\n");
    for (i, (row, reference)) in summarize(refs).iter().zip(refs).enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            i + 1,
            csv_escape(&row.doi),
            csv_escape(&row.title),
            csv_escape(&row.first_author_surname),
            csv_escape(&row.raw),
            row.matched,
            csv_escape(error_of(reference)),
        ));
    }
    out
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn export_markdown(refs: &[Reference]) -> String {
    let stats = SummaryStats::from_references(refs);
    let mut out = String::from("# Reference summary\n\n");
    out.push_str(&format!(
        "**{}** references, **{}** matched ({:.1}%), **{}** failed, **{}** not looked up\n\n",
        stats.total,
        stats.matched,
        stats.matched_pct(),
        stats.failed,
        stats.unenriched
    ));
    out.push_str("| # | DOI | Title | First Author Surname | Raw | Matched |\n");
    out.push_str("|---|-----|-------|----------------------|-----|---------|\n");
    for (i, row) in summarize(refs).iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            md_escape(&row.doi),
            md_escape(&row.title),
            md_escape(&row.first_author_surname),
            md_escape(&row.raw),
            row.matched_indicator(),
        ));
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    stats: SummaryStats,
    references: Vec<JsonReference<'a>>,
}

/// Full, untruncated record; the summary row only carries display columns.
#[derive(Serialize)]
struct JsonReference<'a> {
    index: usize,
    key: String,
    matched: bool,
    #[serde(flatten)]
    reference: &'a Reference,
}

fn export_json(refs: &[Reference]) -> Result<String, ExportError> {
    let report = JsonReport {
        stats: SummaryStats::from_references(refs),
        references: refs
            .iter()
            .enumerate()
            .map(|(index, reference)| JsonReference {
                index,
                key: reference.key(),
                matched: reference.is_matched(),
                reference,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
