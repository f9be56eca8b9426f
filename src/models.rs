//! Data models for the variant interpreter.
//!
//! This module contains the core data structures used throughout the
//! application: annotated variants, retrieved evidence records, and the
//! per-variant reports accumulated over a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Oncogenicity classification assigned by the baseline annotator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Oncogenicity {
    Oncogenic,
    LikelyOncogenic,
    LikelyNeutral,
    Neutral,
    /// Anything else the annotator emits ("Unknown", "Inconclusive", "N/A").
    Other(String),
}

impl fmt::Display for Oncogenicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oncogenicity::Oncogenic => write!(f, "Oncogenic"),
            Oncogenicity::LikelyOncogenic => write!(f, "Likely Oncogenic"),
            Oncogenicity::LikelyNeutral => write!(f, "Likely Neutral"),
            Oncogenicity::Neutral => write!(f, "Neutral"),
            Oncogenicity::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Oncogenicity {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Oncogenic" => Oncogenicity::Oncogenic,
            "Likely Oncogenic" => Oncogenicity::LikelyOncogenic,
            "Likely Neutral" => Oncogenicity::LikelyNeutral,
            "Neutral" => Oncogenicity::Neutral,
            other if other.is_empty() => Oncogenicity::Other("N/A".to_string()),
            other => Oncogenicity::Other(other.to_string()),
        }
    }
}

impl Oncogenicity {
    /// True for classifications that do not warrant further investigation.
    pub fn is_benign(&self) -> bool {
        matches!(self, Oncogenicity::LikelyNeutral | Oncogenicity::Neutral)
    }
}

/// A single annotated genomic variant. Immutable once produced by the
/// annotation service; read-only input to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Gene symbol (e.g. "BRAF").
    pub gene: String,
    /// Protein-change notation (e.g. "p.V600E").
    pub protein_change: String,
    /// Baseline oncogenicity classification.
    pub oncogenicity: Oncogenicity,
    /// AMP tier label derived from the annotator's evidence levels.
    pub amp_tier: String,
    /// Known-drug summary ("Drug(status, Level X Evidence); ..." or "N/A").
    pub drugs: String,
    /// Mutation effect (e.g. "Gain-of-function").
    pub mutation_effect: String,
    /// Free-text description of the mutation effect.
    pub mutation_effect_description: String,
    /// Citations backing the mutation effect.
    pub mutation_effect_citations: String,
}

impl Variant {
    /// True if the known-drug summary carries actual content.
    pub fn has_drugs(&self) -> bool {
        !is_absent(&self.drugs)
    }

    /// Short human-readable label, used in logs and progress output.
    pub fn label(&self) -> String {
        format!("{} {}", self.gene, self.protein_change)
    }
}

/// Returns true for the annotator's "no value" conventions.
pub fn is_absent(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == "N/A" || v == "NA"
}

/// A variant paired with its patient-level context. Owned exclusively by
/// the queue controller until dispatched.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub variant: Variant,
    pub cancer_type: String,
}

/// A literature record retrieved through the literature capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Canonical literature identifier (PMID digit string).
    pub pmid: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// One intervention arm of a clinical trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialIntervention {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

/// A trial record retrieved through the trial capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Canonical trial identifier ("NCTxxxxxxxx").
    pub nct_id: Option<String>,
    pub title: Option<String>,
    pub brief_summary: Option<String>,
    pub study_type: Option<String>,
    pub status: Option<String>,
    pub phase: Option<String>,
    pub conditions: Option<String>,
    #[serde(default)]
    pub interventions: Vec<TrialIntervention>,
    pub eligibility_criteria: Option<String>,
}

/// Wire shape of a literature lookup result, as serialized into a
/// tool-result message and re-parsed during curation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureReply {
    pub status: String,
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
}

/// Wire shape of a trial lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReply {
    pub status: String,
    #[serde(default)]
    pub total_found: u64,
    #[serde(default)]
    pub trials: Vec<TrialRecord>,
}

/// Evidence retained after grounding the narrative against retrieved
/// records: deduplicated, and every identifier is both cited in the
/// narrative and present in the retrieval universe.
#[derive(Debug, Clone, Default)]
pub struct CurationResult {
    pub articles: Vec<ArticleRecord>,
    pub trials: Vec<TrialRecord>,
}

impl CurationResult {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty() && self.trials.is_empty()
    }
}

/// Synthesized fields extracted from the reasoning service's structured
/// output during report synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedFields {
    pub oncoscout_drugs: String,
    pub oncoscout_support_literatures: String,
    pub oncoscout_clinical_trial_ids: String,
    pub oncoscout_brief_report: String,
    pub oncoscout_deep_report: String,
}

/// One normalized report row per variant. Baseline fields are copied from
/// the annotated variant; synthesized fields come from the deep-research
/// path, or placeholders on the skip path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantReport {
    pub gene: String,
    pub protein_change: String,
    pub cancer_type: String,
    pub oncokb_oncogenic: String,
    pub oncokb_amp_tier: String,
    pub oncokb_drugs: String,
    pub oncokb_mutation_effect: String,
    pub oncokb_mutation_effect_citations: String,
    pub oncoscout_drugs: String,
    pub oncoscout_support_literatures: String,
    pub oncoscout_clinical_trial_ids: String,
    pub oncoscout_brief_report: String,
    pub oncoscout_deep_report: String,
}

const PLACEHOLDER: &str = "N/A";
const ERROR_MARKER: &str = "Error";

impl VariantReport {
    /// Baseline-only skeleton with empty synthesized fields.
    fn baseline(item: &WorkItem) -> Self {
        let v = &item.variant;
        Self {
            gene: v.gene.clone(),
            protein_change: v.protein_change.clone(),
            cancer_type: item.cancer_type.clone(),
            oncokb_oncogenic: v.oncogenicity.to_string(),
            oncokb_amp_tier: v.amp_tier.clone(),
            oncokb_drugs: v.drugs.clone(),
            oncokb_mutation_effect: v.mutation_effect.clone(),
            oncokb_mutation_effect_citations: v.mutation_effect_citations.clone(),
            oncoscout_drugs: String::new(),
            oncoscout_support_literatures: String::new(),
            oncoscout_clinical_trial_ids: String::new(),
            oncoscout_brief_report: String::new(),
            oncoscout_deep_report: String::new(),
        }
    }

    /// Skip-path report: baseline facts with placeholder synthesized fields.
    pub fn placeholder(item: &WorkItem) -> Self {
        let mut report = Self::baseline(item);
        report.oncoscout_drugs = PLACEHOLDER.to_string();
        report.oncoscout_support_literatures = PLACEHOLDER.to_string();
        report.oncoscout_clinical_trial_ids = PLACEHOLDER.to_string();
        report.oncoscout_brief_report = PLACEHOLDER.to_string();
        report.oncoscout_deep_report = PLACEHOLDER.to_string();
        report
    }

    /// Deep-research report: baseline facts merged with synthesized fields.
    pub fn synthesized(item: &WorkItem, fields: SynthesizedFields) -> Self {
        let mut report = Self::baseline(item);
        report.oncoscout_drugs = fields.oncoscout_drugs;
        report.oncoscout_support_literatures = fields.oncoscout_support_literatures;
        report.oncoscout_clinical_trial_ids = fields.oncoscout_clinical_trial_ids;
        report.oncoscout_brief_report = fields.oncoscout_brief_report;
        report.oncoscout_deep_report = fields.oncoscout_deep_report;
        report
    }

    /// Error-marked report: the deep-research path failed for this variant,
    /// but the run continues. The diagnostic lands in the deep-report field.
    pub fn error(item: &WorkItem, diagnostic: &str) -> Self {
        let mut report = Self::baseline(item);
        report.oncoscout_drugs = ERROR_MARKER.to_string();
        report.oncoscout_support_literatures = ERROR_MARKER.to_string();
        report.oncoscout_clinical_trial_ids = ERROR_MARKER.to_string();
        report.oncoscout_brief_report = ERROR_MARKER.to_string();
        report.oncoscout_deep_report =
            format!("Failed to synthesize report. Error: {}", diagnostic);
        report
    }

    /// True if this report carries skip-path placeholder values.
    pub fn is_placeholder(&self) -> bool {
        self.oncoscout_brief_report == PLACEHOLDER && self.oncoscout_deep_report == PLACEHOLDER
    }

    /// True if this report is error-marked.
    pub fn is_error(&self) -> bool {
        self.oncoscout_drugs == ERROR_MARKER
    }
}

/// Metadata about a completed run, carried in the JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub input_path: String,
    pub cancer_type: String,
    pub model_used: String,
    pub generated_at: DateTime<Utc>,
    pub variants_total: usize,
    pub deep_researched: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration_seconds: f64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a minimal variant for unit tests.
    pub(crate) fn test_variant(drugs: &str, oncogenicity: &str) -> Variant {
        Variant {
            gene: "KRAS".to_string(),
            protein_change: "p.G12C".to_string(),
            oncogenicity: Oncogenicity::from(oncogenicity),
            amp_tier: "Tier II".to_string(),
            drugs: drugs.to_string(),
            mutation_effect: "Gain-of-function".to_string(),
            mutation_effect_description: "Constitutive activation".to_string(),
            mutation_effect_citations: "12345678".to_string(),
        }
    }

    pub(crate) fn test_item(drugs: &str, oncogenicity: &str) -> WorkItem {
        WorkItem {
            variant: test_variant(drugs, oncogenicity),
            cancer_type: "Melanoma".to_string(),
        }
    }
}
