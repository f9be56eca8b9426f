//! Tabular report generation.
//!
//! The persisted artifact is one row per variant with a fixed column
//! order: identity, baseline annotation, then the synthesized fields.
//! TSV is the default; the JSON form additionally carries run metadata.

use crate::models::{RunMetadata, VariantReport};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Fixed column order of the tabular artifact.
pub const COLUMNS: [&str; 13] = [
    "gene",
    "protein_change",
    "cancer_type",
    "oncokb_oncogenic",
    "oncokb_amp_tier",
    "oncokb_drugs",
    "oncokb_mutation_effect",
    "oncokb_mutation_effect_citations",
    "oncoscout_drugs",
    "oncoscout_support_literatures",
    "oncoscout_clinical_trial_ids",
    "oncoscout_brief_report",
    "oncoscout_deep_report",
];

/// Field values in column order.
fn row_fields(report: &VariantReport) -> [&str; 13] {
    [
        &report.gene,
        &report.protein_change,
        &report.cancer_type,
        &report.oncokb_oncogenic,
        &report.oncokb_amp_tier,
        &report.oncokb_drugs,
        &report.oncokb_mutation_effect,
        &report.oncokb_mutation_effect_citations,
        &report.oncoscout_drugs,
        &report.oncoscout_support_literatures,
        &report.oncoscout_clinical_trial_ids,
        &report.oncoscout_brief_report,
        &report.oncoscout_deep_report,
    ]
}

/// Tabs and newlines inside a field would break the row structure.
fn sanitize(field: &str) -> String {
    field
        .replace(['\t', '\r'], " ")
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// Generate the TSV artifact.
pub fn generate_tsv_report(reports: &[VariantReport]) -> String {
    let mut output = String::new();

    output.push_str(&COLUMNS.join("\t"));
    output.push('\n');

    for report in reports {
        let row: Vec<String> = row_fields(report).iter().map(|f| sanitize(f)).collect();
        output.push_str(&row.join("\t"));
        output.push('\n');
    }

    output
}

/// JSON artifact: run metadata plus the report rows.
#[derive(Debug, Serialize)]
struct JsonArtifact<'a> {
    metadata: &'a RunMetadata,
    reports: &'a [VariantReport],
}

/// Generate the JSON artifact.
pub fn generate_json_report(metadata: &RunMetadata, reports: &[VariantReport]) -> Result<String> {
    serde_json::to_string_pretty(&JsonArtifact { metadata, reports }).map_err(Into::into)
}

/// Write an artifact to a file.
pub fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::test_item;
    use chrono::Utc;

    fn test_metadata() -> RunMetadata {
        RunMetadata {
            input_path: "variants.txt".to_string(),
            cancer_type: "Melanoma".to_string(),
            model_used: "qwen-plus".to_string(),
            generated_at: Utc::now(),
            variants_total: 1,
            deep_researched: 0,
            skipped: 1,
            errors: 0,
            duration_seconds: 4.2,
        }
    }

    #[test]
    fn test_tsv_has_fixed_header_and_one_row_per_report() {
        let reports = vec![
            VariantReport::placeholder(&test_item("N/A", "Neutral")),
            VariantReport::placeholder(&test_item("N/A", "Neutral")),
        ];
        let tsv = generate_tsv_report(&reports);
        let lines: Vec<&str> = tsv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COLUMNS.join("\t"));
        assert_eq!(lines[1].split('\t').count(), COLUMNS.len());
        assert!(lines[1].starts_with("KRAS\tp.G12C\tMelanoma\t"));
    }

    #[test]
    fn test_embedded_tabs_and_newlines_are_sanitized() {
        let mut report = VariantReport::placeholder(&test_item("N/A", "Neutral"));
        report.oncoscout_deep_report = "line one\nline two\twith tab".to_string();

        let tsv = generate_tsv_report(&[report]);
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].split('\t').count(), COLUMNS.len());
        assert!(lines[1].contains("line one line two with tab"));
    }

    #[test]
    fn test_json_report_carries_metadata() {
        let reports = vec![VariantReport::placeholder(&test_item("N/A", "Neutral"))];
        let json = generate_json_report(&test_metadata(), &reports).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"model_used\": \"qwen-plus\""));
        assert!(json.contains("\"reports\""));
        assert!(json.contains("\"gene\": \"KRAS\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.tsv");
        write_report(&path, "gene\nBRAF\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "gene\nBRAF\n");
    }
}
