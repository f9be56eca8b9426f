//! Report synthesis: one reasoning call that reshapes the narrative into
//! a fixed-shape structured object, merged over the baseline facts.
//!
//! Parsing is deliberately forgiving about surrounding prose (the first
//! balanced object substring is used) and deliberately strict about the
//! object itself; anything malformed degrades to an error-marked report
//! instead of propagating upward.

use crate::error::ScoutError;
use crate::llm::{ChatMessage, ReasoningService};
use crate::models::{SynthesizedFields, VariantReport, WorkItem};
use tracing::warn;

const NO_EVIDENCE: &str = "No new evidence was summarized by the research agent.";

const SYNTHESIS_TEMPLATE: &str = r#"You are an expert-level clinical genomics analyst AI. Your sole function is to process a pre-compiled evidence summary and format it into a structured JSON object. You do not make judgments; you only extract, summarize, and structure information.

**Baseline Variant Information:**
{baseline_json}

**Full Evidence Review from Research Agent (this is your primary source of truth):**
--- START OF REVIEW ---
{evidence}
--- END OF REVIEW ---

**Your Task (Follow these steps precisely):**

1. **Directly Ingest the Full Report:** Place the text of the "Full Evidence Review", verbatim and unaltered, into the `oncoscout_deep_report` field.

2. **Create a Brief Summary:** Read the review and write a concise, 2-3 sentence executive summary capturing the most critical therapeutic findings. Place it in the `oncoscout_brief_report` field.

3. **Extract Key Entities:**
   - Identify all mentioned therapeutic agents (drugs) and format them as a single string: "Drug1(Status, Evidence Type); Drug2(Status, Evidence Type); ...". Use the text to determine status (e.g. sensitive, resistance) and evidence type (e.g. Phase II Trial, Preclinical Study).
   - Identify all PubMed IDs (PMIDs) and format them as a comma-separated string: "PMID1,PMID2,...".
   - Identify all Clinical Trial IDs (NCT IDs) and format them as a comma-separated string: "NCT1,NCT2,...".

**JSON Output Schema (You MUST adhere to this structure. Do not add any extra text or explanations outside the JSON object):**
```json
{
    "oncoscout_drugs": "Drug(Status, Evidence Type);...",
    "oncoscout_support_literatures": "PMID1,PMID2,...",
    "oncoscout_clinical_trial_ids": "NCT1,NCT2,...",
    "oncoscout_brief_report": "A 2-3 sentence summary of the key findings from the deep report.",
    "oncoscout_deep_report": "The full, original text from the 'Full Evidence Review' section."
}
```"#;

/// Builds one structured report per deep-researched variant.
pub struct ReportSynthesizer<'a> {
    reasoner: &'a dyn ReasoningService,
}

impl<'a> ReportSynthesizer<'a> {
    pub fn new(reasoner: &'a dyn ReasoningService) -> Self {
        Self { reasoner }
    }

    /// Single blocking call, not a sub-loop: no tools are offered, and
    /// any failure produces an error-marked report for this variant.
    pub async fn synthesize(&self, item: &WorkItem, narrative: &str) -> VariantReport {
        let prompt = synthesis_prompt(item, narrative);

        let turn = match self
            .reasoner
            .complete(&[ChatMessage::user(prompt)], &[])
            .await
        {
            Ok(turn) => turn,
            Err(e) => {
                warn!("Synthesis call failed for {}: {}", item.variant.label(), e);
                return VariantReport::error(item, &e.to_string());
            }
        };

        match parse_synthesis(&turn.text) {
            Ok(fields) => VariantReport::synthesized(item, fields),
            Err(e) => {
                warn!(
                    "Synthesis output unusable for {}: {}. Raw output was: {}",
                    item.variant.label(),
                    e,
                    turn.text
                );
                VariantReport::error(item, &e.to_string())
            }
        }
    }
}

fn synthesis_prompt(item: &WorkItem, narrative: &str) -> String {
    let baseline_json =
        serde_json::to_string(&item.variant).unwrap_or_else(|_| "{}".to_string());
    let evidence = if narrative.trim().is_empty() {
        NO_EVIDENCE
    } else {
        narrative
    };

    SYNTHESIS_TEMPLATE
        .replace("{baseline_json}", &baseline_json)
        .replace("{evidence}", evidence)
}

fn parse_synthesis(text: &str) -> Result<SynthesizedFields, ScoutError> {
    let object = extract_json_object(text).ok_or_else(|| {
        ScoutError::DataParsing("no structured object found in synthesis output".to_string())
    })?;

    serde_json::from_str(object)
        .map_err(|e| ScoutError::DataParsing(format!("malformed synthesis object: {}", e)))
}

/// Locate the first balanced `{...}` substring. String-literal aware, so
/// braces inside quoted values don't unbalance the scan.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
