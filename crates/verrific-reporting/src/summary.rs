use serde::Serialize;
use verrific_core::{Enrichment, Reference, find_duplicates, truncate_chars};

/// Width at which the title and raw columns are cut.
pub const COLUMN_WIDTH: usize = 50;

pub const MATCHED: &str = "✅";
pub const NOT_MATCHED: &str = "⚠️";

/// One row of the summary table. Absent fields render as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub doi: String,
    pub title: String,
    pub first_author_surname: String,
    pub raw: String,
    pub matched: bool,
}

impl SummaryRow {
    pub fn from_reference(reference: &Reference) -> Self {
        Self {
            doi: reference.doi().unwrap_or_default().to_string(),
            title: reference
                .title()
                .map(|t| truncate(t, COLUMN_WIDTH))
                .unwrap_or_default(),
            first_author_surname: reference
                .first_author_surname()
                .unwrap_or_default()
                .to_string(),
            raw: reference
                .raw()
                .map(|r| truncate(r, COLUMN_WIDTH))
                .unwrap_or_default(),
            matched: reference.is_matched(),
        }
    }

    pub fn matched_indicator(&self) -> &'static str {
        if self.matched { MATCHED } else { NOT_MATCHED }
    }
}

/// Row-per-reference summary, in input order.
pub fn summarize(refs: &[Reference]) -> Vec<SummaryRow> {
    refs.iter().map(SummaryRow::from_reference).collect()
}

/// Cut `s` to `max` characters followed by `...`; shorter strings pass through.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", truncate_chars(s, max))
    } else {
        s.to_string()
    }
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub matched: usize,
    /// Enriched with a failure marker.
    pub failed: usize,
    /// Never enriched (skipped, abandoned, or not run).
    pub unenriched: usize,
    pub with_doi: usize,
    /// References that share their key with an earlier one.
    pub duplicates: usize,
}

impl SummaryStats {
    pub fn from_references(refs: &[Reference]) -> Self {
        let mut stats = SummaryStats {
            total: refs.len(),
            ..Default::default()
        };
        for r in refs {
            match r.enrichment() {
                Some(Enrichment::Matched(_)) => stats.matched += 1,
                Some(Enrichment::Failed(_)) => stats.failed += 1,
                None => stats.unenriched += 1,
            }
            if r.doi().is_some() {
                stats.with_doi += 1;
            }
        }
        stats.duplicates = find_duplicates(refs)
            .iter()
            .map(|group| group.len() - 1)
            .sum();
        stats
    }

    /// Percentage of references that matched, 0 for an empty batch.
    pub fn matched_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_boundary() {
        let exact = "a".repeat(50);
        assert_eq!(truncate(&exact, 50), exact);

        let long = format!("{}tail", "b".repeat(50));
        assert_eq!(truncate(&long, 50), format!("{}...", "b".repeat(50)));

        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("", 50), "");
    }

    #[test]
    fn truncation_counts_characters() {
        let s = "ü".repeat(60);
        let out = truncate(&s, 50);
        assert_eq!(out.chars().count(), 53);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn rows_render_absent_fields_empty() {
        let r = Reference::new(None, None, Some("Smith".into()), None);
        let row = SummaryRow::from_reference(&r);
        assert_eq!(row.doi, "");
        assert_eq!(row.title, "");
        assert_eq!(row.first_author_surname, "Smith");
        assert_eq!(row.raw, "");
        assert_eq!(row.matched_indicator(), NOT_MATCHED);
    }

    #[test]
    fn matched_indicator_follows_enrichment() {
        let unset = Reference::new(Some("10.1/a".into()), None, None, None);
        let mut failed = unset.clone();
        let mut ok = unset.clone();
        failed.set_enrichment(Enrichment::from_json(
            serde_json::json!({"_error": "HTTP 404"}),
        ));
        ok.set_enrichment(Enrichment::from_json(serde_json::json!({"title": "..."})));

        let rows = summarize(&[unset, failed, ok]);
        assert_eq!(rows[0].matched_indicator(), NOT_MATCHED);
        assert_eq!(rows[1].matched_indicator(), NOT_MATCHED);
        assert_eq!(rows[2].matched_indicator(), MATCHED);
    }

    #[test]
    fn stats_count_outcomes_and_duplicates() {
        let mut a = Reference::new(Some("10.1/A".into()), None, None, None);
        a.set_enrichment(Enrichment::Matched(serde_json::json!({})));
        let mut b = Reference::new(Some("10.1/a".into()), None, None, None);
        b.set_enrichment(Enrichment::Failed("HTTP 404".into()));
        let c = Reference::new(None, Some("Foo".into()), Some("Bar".into()), None);
        let d = Reference::new(None, Some("foo".into()), Some("bar".into()), None);
        let e = Reference::new(None, Some("foo".into()), Some("BAR ".into()), None);

        let stats = SummaryStats::from_references(&[a, b, c, d, e]);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unenriched, 3);
        assert_eq!(stats.with_doi, 2);
        assert_eq!(stats.duplicates, 3);
        assert!((stats.matched_pct() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_stats() {
        let stats = SummaryStats::from_references(&[]);
        assert_eq!(stats, SummaryStats::default());
        assert_eq!(stats.matched_pct(), 0.0);
    }
}
