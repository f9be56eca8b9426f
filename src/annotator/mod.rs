//! Baseline annotation service client.
//!
//! Runs the external OncoKB annotator script as a subprocess against the
//! raw tab-separated variant file and parses its TSV output into
//! [`Variant`] records. The annotator's per-level therapeutic evidence
//! columns (`LEVEL_1` .. `LEVEL_R2`) are folded into a single known-drug
//! summary and an AMP tier label.
//!
//! Any failure here degrades to an empty variant list with a warning;
//! only the reasoning service is allowed to abort a run.

use crate::error::ScoutError;
use crate::models::{is_absent, Oncogenicity, Variant};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

/// Evidence levels in precedence order; the first populated level decides
/// the AMP tier.
const LEVEL_PRECEDENCE: [&str; 7] = ["1", "2", "R1", "3A", "3B", "R2", "4"];

/// (AMP tier, evidence grade) for each therapeutic level.
fn level_mapping(level: &str) -> Option<(&'static str, &'static str)> {
    match level {
        "1" | "2" | "R1" => Some(("Tier I", "A")),
        "3A" => Some(("Tier I", "B")),
        "3B" => Some(("Tier II", "C")),
        "4" | "R2" => Some(("Tier II", "D")),
        _ => None,
    }
}

/// Column names used to read the raw input file and the annotator output.
#[derive(Debug, Clone)]
pub struct InputColumns {
    pub gene: String,
    pub protein_change: String,
    pub cancer_type: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            gene: "Hugo_Symbol".to_string(),
            protein_change: "HGVSp_Short".to_string(),
            cancer_type: "Cancer_Type".to_string(),
        }
    }
}

/// Client for the external annotator script.
pub struct Annotator {
    python: String,
    script_path: PathBuf,
    api_token: String,
}

impl Annotator {
    pub fn new(script_path: PathBuf, api_token: String) -> Self {
        Self {
            python: "python".to_string(),
            script_path,
            api_token,
        }
    }

    /// Build from `ONCOKB_ANNOTATOR_PATH` / `ONCOKB_API_TOKEN`, with the
    /// config file as a fallback for the script path.
    pub fn from_env(config_script_path: Option<&str>) -> Result<Self, ScoutError> {
        let script_path = std::env::var("ONCOKB_ANNOTATOR_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| config_script_path.map(String::from))
            .ok_or_else(|| {
                ScoutError::Configuration(
                    "annotator script path not configured (set ONCOKB_ANNOTATOR_PATH)".to_string(),
                )
            })?;
        let api_token = std::env::var("ONCOKB_API_TOKEN").map_err(|_| {
            ScoutError::Configuration("annotator API token not set (ONCOKB_API_TOKEN)".to_string())
        })?;

        Ok(Self::new(PathBuf::from(script_path), api_token))
    }

    /// Annotate the raw variant file for the given tumor type.
    pub async fn annotate(
        &self,
        input_path: &Path,
        tumor_type: &str,
        columns: &InputColumns,
    ) -> Result<Vec<Variant>, ScoutError> {
        info!(
            "Running annotator on {} for {}",
            input_path.display(),
            tumor_type
        );

        let output_file = NamedTempFile::new().map_err(|e| {
            ScoutError::ExternalService(format!("failed to create annotator output file: {}", e))
        })?;

        let output = Command::new(&self.python)
            .arg(&self.script_path)
            .arg("-i")
            .arg(input_path)
            .arg("-o")
            .arg(output_file.path())
            .arg("-b")
            .arg(&self.api_token)
            .arg("-t")
            .arg(tumor_type)
            .arg("-d")
            .output()
            .await
            .map_err(|e| {
                ScoutError::ExternalService(format!("failed to spawn annotator: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScoutError::ExternalService(format!(
                "annotator exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let content = std::fs::read_to_string(output_file.path()).map_err(|e| {
            ScoutError::ExternalService(format!("failed to read annotator output: {}", e))
        })?;

        if content.trim().is_empty() {
            warn!("Annotator produced an empty output file");
            return Ok(Vec::new());
        }

        parse_annotated_tsv(&content, columns)
    }
}

/// Header-indexed view over one TSV row.
struct Row<'a> {
    index: &'a HashMap<String, usize>,
    cells: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn field(&self, name: &str) -> &'a str {
        self.index
            .get(name)
            .and_then(|&i| self.cells.get(i))
            .copied()
            .unwrap_or("")
    }
}

/// Parse the annotator's TSV output into variants, folding the evidence
/// level columns into the drug summary and AMP tier.
pub fn parse_annotated_tsv(
    content: &str,
    columns: &InputColumns,
) -> Result<Vec<Variant>, ScoutError> {
    let mut lines = content.lines().filter(|l| !l.starts_with('#'));

    let header = lines
        .next()
        .ok_or_else(|| ScoutError::DataParsing("annotator output has no header".to_string()))?;
    let index: HashMap<String, usize> = header
        .split('\t')
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    if !index.contains_key(columns.gene.as_str()) {
        return Err(ScoutError::DataParsing(format!(
            "annotator output is missing the '{}' column",
            columns.gene
        )));
    }

    let mut variants = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let row = Row {
            index: &index,
            cells: line.split('\t').collect(),
        };

        let (amp_tier, drugs) = fold_evidence_levels(&row);
        variants.push(Variant {
            gene: row.field(&columns.gene).to_string(),
            protein_change: row.field(&columns.protein_change).to_string(),
            oncogenicity: Oncogenicity::from(row.field("ONCOGENIC")),
            amp_tier,
            drugs,
            mutation_effect: or_na(row.field("MUTATION_EFFECT")),
            mutation_effect_description: or_na(row.field("MUTATION_EFFECT_DESCRIPTION")),
            mutation_effect_citations: or_na(row.field("MUTATION_EFFECT_CITATIONS")),
        });
    }

    Ok(variants)
}

fn or_na(value: &str) -> String {
    if is_absent(value) {
        "N/A".to_string()
    } else {
        value.to_string()
    }
}

/// Fold `LEVEL_*` columns into (AMP tier, drug summary). Resistance
/// levels carry an `R` prefix. When no level is populated, the tier
/// falls back to the oncogenicity classification.
fn fold_evidence_levels(row: &Row<'_>) -> (String, String) {
    let mut tier: Option<&'static str> = None;
    let mut drug_entries = Vec::new();

    for level in LEVEL_PRECEDENCE {
        let cell = row.field(&format!("LEVEL_{}", level));
        if is_absent(cell) {
            continue;
        }
        let Some((level_tier, grade)) = level_mapping(level) else {
            continue;
        };
        if tier.is_none() {
            tier = Some(level_tier);
        }
        let status = if level.contains('R') {
            "resistance"
        } else {
            "sensitive"
        };
        for drug in cell.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            drug_entries.push(format!("{}({}, Level {} Evidence)", drug, status, grade));
        }
    }

    let tier = tier.unwrap_or_else(|| match Oncogenicity::from(row.field("ONCOGENIC")) {
        Oncogenicity::Oncogenic | Oncogenicity::LikelyOncogenic => "Tier II",
        Oncogenicity::LikelyNeutral | Oncogenicity::Neutral => "Tier IV",
        Oncogenicity::Other(_) => "Tier III",
    });

    let drugs = if drug_entries.is_empty() {
        "N/A".to_string()
    } else {
        drug_entries.join("; ")
    };

    (tier.to_string(), drugs)
}

/// Read the patient's tumor type from the raw input file (first data row
/// of the configured cancer-type column).
pub fn read_tumor_type(input_path: &Path, cancer_type_col: &str) -> Result<String, ScoutError> {
    let content = std::fs::read_to_string(input_path).map_err(|e| {
        ScoutError::DataParsing(format!("failed to read {}: {}", input_path.display(), e))
    })?;

    let mut lines = content.lines().filter(|l| !l.starts_with('#'));
    let header = lines
        .next()
        .ok_or_else(|| ScoutError::DataParsing("input file has no header".to_string()))?;
    let position = header
        .split('\t')
        .position(|name| name.trim() == cancer_type_col)
        .ok_or_else(|| {
            ScoutError::DataParsing(format!("input file has no '{}' column", cancer_type_col))
        })?;

    let first_row = lines
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ScoutError::DataParsing("input file has no data rows".to_string()))?;
    let value = first_row
        .split('\t')
        .nth(position)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ScoutError::DataParsing(format!("first row has no value for '{}'", cancer_type_col))
        })?;

    Ok(value.to_string())
}
