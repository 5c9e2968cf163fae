use std::io::Write;

use owo_colors::OwoColorize;
use verrific_core::{EnrichStats, Enrichment, Reference};
use verrific_grobid::BatchReport;
use verrific_reporting::{SummaryRow, SummaryStats, truncate};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn header(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// Print what the extractor found.
pub fn print_extraction_summary(
    w: &mut dyn Write,
    file_name: &str,
    refs: &[Reference],
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Extracting references from {}...", file_name)?;
    writeln!(w, "Found {} references", refs.len())?;

    let with_doi = refs.iter().filter(|r| r.doi().is_some()).count();
    let raw_only = refs
        .iter()
        .filter(|r| r.doi().is_none() && r.title().is_none() && r.first_author_surname().is_none())
        .count();
    let msg = format!(
        "({} with DOI, {} with raw text only)",
        with_doi, raw_only
    );
    if color.enabled() {
        writeln!(w, "{}", msg.dimmed())?;
    } else {
        writeln!(w, "{}", msg)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Dry run: every extracted field, nothing looked up.
pub fn print_references(
    w: &mut dyn Write,
    refs: &[Reference],
    color: ColorMode,
) -> std::io::Result<()> {
    for (i, r) in refs.iter().enumerate() {
        if color.enabled() {
            writeln!(w, "{}", format!("[{}]", i + 1).bold().yellow())?;
        } else {
            writeln!(w, "[{}]", i + 1)?;
        }
        writeln!(w, "  DOI:    {}", r.doi().unwrap_or("-"))?;
        writeln!(w, "  Title:  {}", r.title().unwrap_or("-"))?;
        writeln!(w, "  Author: {}", r.first_author_surname().unwrap_or("-"))?;
        let raw = r.raw().map(|s| truncate(s, 200));
        let raw = raw.as_deref().unwrap_or("-");
        if color.enabled() {
            writeln!(w, "  Raw:    {}", raw.dimmed())?;
        } else {
            writeln!(w, "  Raw:    {}", raw)?;
        }
        writeln!(w, "  Key:    {}", r.key())?;
        writeln!(w)?;
    }
    Ok(())
}

/// The per-reference summary table.
pub fn print_table(
    w: &mut dyn Write,
    rows: &[SummaryRow],
    refs: &[Reference],
    color: ColorMode,
) -> std::io::Result<()> {
    header(w, "REFERENCES", color)?;
    for (i, (row, r)) in rows.iter().zip(refs).enumerate() {
        let idx = format!("[{}]", i + 1);
        if color.enabled() {
            if row.matched {
                writeln!(w, "{} {} {}", row.matched_indicator(), idx.bold(), "matched".green())?;
            } else {
                writeln!(w, "{} {} {}", row.matched_indicator(), idx.bold(), "not matched".yellow())?;
            }
        } else {
            let status = if row.matched { "matched" } else { "not matched" };
            writeln!(w, "{} {} {}", row.matched_indicator(), idx, status)?;
        }
        writeln!(w, "    DOI:    {}", or_dash(&row.doi))?;
        writeln!(w, "    Title:  {}", or_dash(&row.title))?;
        writeln!(w, "    Author: {}", or_dash(&row.first_author_surname))?;
        writeln!(w, "    Raw:    {}", or_dash(&row.raw))?;
        if let Some(reason) = r.enrichment().and_then(Enrichment::error) {
            if color.enabled() {
                writeln!(w, "    {}", format!("Lookup: {}", reason).red())?;
            } else {
                writeln!(w, "    Lookup: {}", reason)?;
            }
        }
    }
    Ok(())
}

/// Totals after enrichment.
pub fn print_summary(
    w: &mut dyn Write,
    stats: &SummaryStats,
    run: &EnrichStats,
    color: ColorMode,
) -> std::io::Result<()> {
    header(w, "SUMMARY", color)?;
    writeln!(w, "  Total references: {}", stats.total)?;
    writeln!(w, "  Looked up: {}", run.looked_up())?;
    if run.skipped > 0 {
        let msg = format!("Skipped (nothing to query): {}", run.skipped);
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;

    if color.enabled() {
        writeln!(w, "  {} {} ({:.1}%)", "Matched:".green(), stats.matched, stats.matched_pct())?;
    } else {
        writeln!(w, "  Matched: {} ({:.1}%)", stats.matched, stats.matched_pct())?;
    }
    if stats.failed > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Not matched:".yellow(), stats.failed)?;
        } else {
            writeln!(w, "  Not matched: {}", stats.failed)?;
        }
    }
    if run.abandoned > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Abandoned (cancelled or deadline):".red(), run.abandoned)?;
        } else {
            writeln!(w, "  Abandoned (cancelled or deadline): {}", run.abandoned)?;
        }
    }
    if stats.duplicates > 0 {
        let msg = format!("Duplicate references: {}", stats.duplicates);
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Result of `verrific convert`.
pub fn print_batch_report(
    w: &mut dyn Write,
    report: &BatchReport,
    color: ColorMode,
) -> std::io::Result<()> {
    header(w, "CONVERSION", color)?;
    for (pdf, tei) in &report.converted {
        writeln!(w, "  {} -> {}", pdf.display(), tei.display())?;
    }
    if !report.failed.is_empty() {
        writeln!(w)?;
        for (input, reason) in &report.failed {
            if color.enabled() {
                writeln!(w, "  {} {}: {}", "FAILED".red().bold(), input.display(), reason)?;
            } else {
                writeln!(w, "  FAILED {}: {}", input.display(), reason)?;
            }
        }
    }
    writeln!(w)?;
    writeln!(
        w,
        "  Converted {} of {} files",
        report.converted.len(),
        report.total()
    )?;
    Ok(())
}
