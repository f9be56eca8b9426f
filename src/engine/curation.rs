//! Evidence curation: grounding the narrative in retrieved records.
//!
//! The final narrative is an unverified natural-language claim. Only
//! records that were both retrieved through a capability call during the
//! loop and explicitly cited in the narrative are promoted to curated
//! evidence, so fabricated citations never survive this step.

use crate::llm::ChatMessage;
use crate::models::{CurationResult, LiteratureReply, TrialReply};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Strategy for pulling cited canonical identifiers out of free text.
/// Pluggable so a stricter scheme (structured citations emitted by the
/// reasoning service itself) can replace the regex default without
/// touching the rest of the pipeline.
pub trait CitationExtractor: Send + Sync {
    fn literature_ids(&self, narrative: &str) -> HashSet<String>;
    fn trial_ids(&self, narrative: &str) -> HashSet<String>;
}

/// Default extractor: PMIDs are standalone runs of 8+ digits, trial ids
/// are `NCT` followed by digits. Word boundaries keep the digit tail of
/// an NCT id from also counting as a PMID.
pub struct RegexCitations {
    pmid: Regex,
    nct: Regex,
}

impl RegexCitations {
    pub fn new() -> Self {
        Self {
            pmid: Regex::new(r"\b\d{8,}\b").expect("valid literal pattern"),
            nct: Regex::new(r"\bNCT\d+\b").expect("valid literal pattern"),
        }
    }
}

impl Default for RegexCitations {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationExtractor for RegexCitations {
    fn literature_ids(&self, narrative: &str) -> HashSet<String> {
        self.pmid
            .find_iter(narrative)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn trial_ids(&self, narrative: &str) -> HashSet<String> {
        self.nct
            .find_iter(narrative)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Reconcile the loop's narrative against everything it retrieved.
///
/// Walks tool-result messages in transcript order to build the retrieval
/// universe, intersects with the narrative's citations, and deduplicates
/// keeping the first-seen record per identifier.
pub fn curate(
    transcript: &[ChatMessage],
    narrative: &str,
    extractor: &dyn CitationExtractor,
) -> CurationResult {
    let mut all_articles = Vec::new();
    let mut all_trials = Vec::new();

    for message in transcript.iter().filter(|m| m.is_tool_result()) {
        match message.name.as_deref() {
            Some("pubmed_search") => {
                if let Ok(reply) = serde_json::from_str::<LiteratureReply>(&message.content) {
                    all_articles.extend(reply.articles);
                }
            }
            Some("query_clinical_trials") => {
                if let Ok(reply) = serde_json::from_str::<TrialReply>(&message.content) {
                    all_trials.extend(reply.trials);
                }
            }
            _ => {}
        }
    }

    let cited_pmids = extractor.literature_ids(narrative);
    let cited_ncts = extractor.trial_ids(narrative);
    debug!(
        "Narrative cites {} PMIDs and {} NCT ids; retrieved {} articles and {} trials",
        cited_pmids.len(),
        cited_ncts.len(),
        all_articles.len(),
        all_trials.len()
    );

    let mut seen_pmids = HashSet::new();
    let articles = all_articles
        .into_iter()
        .filter(|a| cited_pmids.contains(&a.pmid))
        .filter(|a| seen_pmids.insert(a.pmid.clone()))
        .collect();

    let mut seen_ncts = HashSet::new();
    let trials = all_trials
        .into_iter()
        .filter(|t| {
            t.nct_id
                .as_ref()
                .is_some_and(|id| cited_ncts.contains(id) && seen_ncts.insert(id.clone()))
        })
        .collect();

    CurationResult { articles, trials }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, TrialRecord};
    use serde_json::json;

    fn literature_message(articles: &[(&str, &str)]) -> ChatMessage {
        let payload = serde_json::to_value(LiteratureReply {
            status: "success".to_string(),
            articles: articles
                .iter()
                .map(|(pmid, title)| ArticleRecord {
                    pmid: pmid.to_string(),
                    title: title.to_string(),
                    abstract_text: String::new(),
                })
                .collect(),
        })
        .unwrap();
        ChatMessage::tool_result("pubmed_search", "call_0", &payload)
    }

    fn trial_message(nct_ids: &[&str]) -> ChatMessage {
        let payload = serde_json::to_value(TrialReply {
            status: "success".to_string(),
            total_found: nct_ids.len() as u64,
            trials: nct_ids
                .iter()
                .map(|id| TrialRecord {
                    nct_id: Some(id.to_string()),
                    title: None,
                    brief_summary: None,
                    study_type: None,
                    status: None,
                    phase: None,
                    conditions: None,
                    interventions: Vec::new(),
                    eligibility_criteria: None,
                })
                .collect(),
        })
        .unwrap();
        ChatMessage::tool_result("query_clinical_trials", "call_1", &payload)
    }

    #[test]
    fn test_regex_extractor() {
        let extractor = RegexCitations::new();
        let narrative = "Supported by (PMID: 31452104) and trial NCT04303780. \
                         Short ids like 1234567 are ignored.";

        let pmids = extractor.literature_ids(narrative);
        assert_eq!(pmids.len(), 1);
        assert!(pmids.contains("31452104"));

        let ncts = extractor.trial_ids(narrative);
        assert_eq!(ncts.len(), 1);
        assert!(ncts.contains("NCT04303780"));
    }

    #[test]
    fn test_nct_digits_do_not_count_as_pmids() {
        let extractor = RegexCitations::new();
        let pmids = extractor.literature_ids("Only a trial here: NCT01234567.");
        assert!(pmids.is_empty());
    }

    #[test]
    fn test_fabricated_citations_are_dropped() {
        let transcript = vec![
            ChatMessage::user("brief"),
            literature_message(&[("31452104", "Real article")]),
        ];
        // 99999999 was never retrieved; it must not survive curation.
        let narrative = "Evidence from PMID: 31452104 and PMID: 99999999.";
        let result = curate(&transcript, narrative, &RegexCitations::new());

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].pmid, "31452104");
    }

    #[test]
    fn test_uncited_records_are_dropped() {
        let transcript = vec![
            ChatMessage::user("brief"),
            literature_message(&[("31452104", "Cited"), ("28783719", "Uncited")]),
            trial_message(&["NCT04303780", "NCT00000001"]),
        ];
        let narrative = "See PMID: 31452104 and NCT04303780 only.";
        let result = curate(&transcript, narrative, &RegexCitations::new());

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.trials.len(), 1);
        assert_eq!(result.trials[0].nct_id.as_deref(), Some("NCT04303780"));
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let transcript = vec![
            ChatMessage::user("brief"),
            literature_message(&[("31452104", "First retrieval")]),
            literature_message(&[("31452104", "Second retrieval")]),
        ];
        let result = curate(
            &transcript,
            "Cited twice: 31452104.",
            &RegexCitations::new(),
        );

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].title, "First retrieval");
    }

    #[test]
    fn test_malformed_tool_payloads_are_skipped() {
        let mut bad = ChatMessage::tool_result("pubmed_search", "call_0", &json!({}));
        bad.content = "not json at all".to_string();
        let transcript = vec![ChatMessage::user("brief"), bad];

        let result = curate(&transcript, "PMID: 31452104", &RegexCitations::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_narrative_curates_nothing() {
        let transcript = vec![
            ChatMessage::user("brief"),
            literature_message(&[("31452104", "Article")]),
        ];
        let result = curate(&transcript, "", &RegexCitations::new());
        assert!(result.is_empty());
    }
}
