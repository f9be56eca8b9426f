//! Trial search against the ClinicalTrials.gov v2 studies API.
//!
//! Callers supply structured parameters (intervention, condition, free
//! terms); at least one must be present, enforced here at the argument
//! boundary rather than inside the HTTP request builder. User-friendly
//! status values ("Active") are mapped to the API's status enums.

use crate::capability::{error_payload, Capability, ToolDefinition};
use crate::error::ScoutError;
use crate::models::{TrialIntervention, TrialRecord, TrialReply};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const CTGOV_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

const STATUS_SUCCESS: &str = "success";
const STATUS_NO_RESULTS: &str = "no results found";

/// Every status enum the API accepts; used when the caller's filter
/// doesn't map to a known friendly value.
const ALL_STATUSES: &str =
    "RECRUITING|NOT_YET_RECRUITING|ACTIVE_NOT_RECRUITING|ENROLLING_BY_INVITATION|COMPLETED|TERMINATED";

/// ClinicalTrials.gov lookup capability.
pub struct ClinicalTrialsSearch {
    http_client: reqwest::Client,
    base_url: String,
    default_max_results: u64,
    courtesy_delay: Duration,
}

/// Parsed search parameters from a capability invocation.
#[derive(Debug)]
struct TrialQuery {
    intervention: Option<String>,
    condition: Option<String>,
    other_terms: Option<String>,
    max_results: u64,
    status: String,
    study_type: String,
}

/// Map a user-friendly status to the API's overall-status enums.
fn map_status(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "active" => "RECRUITING|NOT_YET_RECRUITING|ACTIVE_NOT_RECRUITING|ENROLLING_BY_INVITATION",
        "recruiting" => "RECRUITING",
        "completed" => "COMPLETED",
        _ => ALL_STATUSES,
    }
}

// Wire shapes for the slices of protocolSection we read.

#[derive(Debug, Default, Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Study>,
    #[serde(default, rename = "totalCount")]
    total_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Study {
    #[serde(default)]
    protocol_section: ProtocolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtocolSection {
    #[serde(default)]
    identification_module: IdentificationModule,
    #[serde(default)]
    description_module: DescriptionModule,
    #[serde(default)]
    design_module: DesignModule,
    #[serde(default)]
    status_module: StatusModule,
    #[serde(default)]
    conditions_module: ConditionsModule,
    #[serde(default)]
    arms_and_interventions_module: ArmsModule,
    #[serde(default)]
    eligibility_module: EligibilityModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentificationModule {
    nct_id: Option<String>,
    brief_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionModule {
    brief_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DesignModule {
    study_type: Option<String>,
    #[serde(default)]
    phases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusModule {
    overall_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionsModule {
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArmsModule {
    #[serde(default)]
    interventions: Vec<WireIntervention>,
}

#[derive(Debug, Deserialize)]
struct WireIntervention {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityModule {
    eligibility_criteria: Option<String>,
}

fn to_trial_record(study: Study) -> TrialRecord {
    let proto = study.protocol_section;
    TrialRecord {
        nct_id: proto.identification_module.nct_id,
        title: proto.identification_module.brief_title,
        brief_summary: proto.description_module.brief_summary,
        study_type: proto.design_module.study_type,
        status: proto.status_module.overall_status,
        phase: Some(proto.design_module.phases.join(", ")),
        conditions: Some(proto.conditions_module.conditions.join(", ")),
        interventions: proto
            .arms_and_interventions_module
            .interventions
            .into_iter()
            .map(|i| TrialIntervention {
                kind: i.kind,
                name: i.name,
            })
            .collect(),
        eligibility_criteria: proto.eligibility_module.eligibility_criteria,
    }
}

impl ClinicalTrialsSearch {
    pub fn new(http_client: reqwest::Client, default_max_results: u64, courtesy_delay: Duration) -> Self {
        Self {
            http_client,
            base_url: CTGOV_BASE_URL.to_string(),
            default_max_results,
            courtesy_delay,
        }
    }

    async fn search(&self, query: &TrialQuery) -> Result<TrialReply, ScoutError> {
        info!(
            "Querying ClinicalTrials.gov for intervention={:?}, condition={:?}, status='{}'",
            query.intervention, query.condition, query.status
        );

        let mut params: Vec<(&str, String)> = vec![
            ("pageSize", query.max_results.to_string()),
            ("format", "json".to_string()),
            ("filter.overallStatus", map_status(&query.status).to_string()),
        ];
        if let Some(ref intervention) = query.intervention {
            params.push(("query.intr", intervention.clone()));
        }
        if let Some(ref condition) = query.condition {
            params.push(("query.cond", condition.clone()));
        }
        if let Some(ref terms) = query.other_terms {
            params.push(("query.term", terms.clone()));
        }
        if !query.study_type.is_empty() {
            params.push(("filter.advanced", format!("AREA[StudyType]{}", query.study_type)));
        }

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ScoutError::ExternalService(format!("trial request failed: {}", e)))?;
        tokio::time::sleep(self.courtesy_delay).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::ExternalService(format!(
                "trial search returned HTTP {}: {}",
                status, body
            )));
        }

        let data: StudiesResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::DataParsing(format!("malformed studies response: {}", e)))?;

        if data.studies.is_empty() {
            return Ok(TrialReply {
                status: STATUS_NO_RESULTS.to_string(),
                total_found: 0,
                trials: Vec::new(),
            });
        }

        Ok(TrialReply {
            status: STATUS_SUCCESS.to_string(),
            total_found: data.total_count,
            trials: data.studies.into_iter().map(to_trial_record).collect(),
        })
    }
}

#[async_trait]
impl Capability for ClinicalTrialsSearch {
    fn name(&self) -> &'static str {
        "query_clinical_trials"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Queries ClinicalTrials.gov for relevant studies using structured parameters. \
             Provide at least one of 'intervention', 'condition', or 'other_terms'.",
            json!({
                "type": "object",
                "properties": {
                    "intervention": {
                        "type": "string",
                        "description": "Drug or therapy name to search for."
                    },
                    "condition": {
                        "type": "string",
                        "description": "Disease or condition to search for."
                    },
                    "other_terms": {
                        "type": "string",
                        "description": "Free-text search terms."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of trials to return."
                    },
                    "status": {
                        "type": "string",
                        "description": "Trial status filter: Active, Recruiting, or Completed."
                    },
                    "study_type": {
                        "type": "string",
                        "description": "Study type filter, e.g. Interventional."
                    }
                },
                "required": []
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Value {
        let get_string = |key: &str| {
            arguments
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let query = TrialQuery {
            intervention: get_string("intervention"),
            condition: get_string("condition"),
            other_terms: get_string("other_terms"),
            max_results: arguments
                .get("max_results")
                .and_then(|v| v.as_u64())
                .unwrap_or(self.default_max_results),
            status: get_string("status").unwrap_or_else(|| "Active".to_string()),
            study_type: get_string("study_type").unwrap_or_else(|| "Interventional".to_string()),
        };

        if query.intervention.is_none() && query.condition.is_none() && query.other_terms.is_none()
        {
            return error_payload(
                "Provide at least one of 'intervention', 'condition', or 'other_terms'.",
            );
        }

        match self.search(&query).await {
            Ok(reply) => serde_json::to_value(&reply)
                .unwrap_or_else(|e| error_payload(format!("ClinicalTrials search failed: {}", e))),
            Err(e) => error_payload(format!("ClinicalTrials search failed: {}", e)),
        }
    }
}
