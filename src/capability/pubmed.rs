//! Literature search against the NCBI PubMed E-utilities.
//!
//! Two-step lookup: `esearch.fcgi` (JSON) resolves a query to PMIDs, then
//! `efetch.fcgi` (XML) fetches titles and abstracts. A courtesy delay is
//! inserted after each request; NCBI rate limiting is their policy, ours
//! is simply not to hammer them.

use crate::capability::{error_payload, Capability, ToolDefinition};
use crate::error::ScoutError;
use crate::models::{ArticleRecord, LiteratureReply};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

const STATUS_SUCCESS: &str = "success";
const STATUS_NO_RESULTS: &str = "no results found";

/// PubMed literature lookup capability.
pub struct PubMedSearch {
    http_client: reqwest::Client,
    base_url: String,
    default_max_results: u64,
    courtesy_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    #[serde(default)]
    esearchresult: EsearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedSearch {
    pub fn new(http_client: reqwest::Client, default_max_results: u64, courtesy_delay: Duration) -> Self {
        Self {
            http_client,
            base_url: EUTILS_BASE_URL.to_string(),
            default_max_results,
            courtesy_delay,
        }
    }

    async fn search(&self, query: &str, max_results: u64) -> Result<LiteratureReply, ScoutError> {
        info!("Searching PubMed for query: '{}'", query);

        let search_url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = max_results.to_string();
        let response = self
            .http_client
            .get(&search_url)
            .query(&[
                ("db", "pubmed"),
                ("term", query),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::ExternalService(format!("esearch request failed: {}", e)))?;
        tokio::time::sleep(self.courtesy_delay).await;

        if !response.status().is_success() {
            return Err(ScoutError::ExternalService(format!(
                "esearch returned HTTP {}",
                response.status()
            )));
        }

        let search_result: EsearchResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::DataParsing(format!("malformed esearch response: {}", e)))?;
        let ids = search_result.esearchresult.idlist;

        if ids.is_empty() {
            return Ok(LiteratureReply {
                status: STATUS_NO_RESULTS.to_string(),
                articles: Vec::new(),
            });
        }

        let fetch_url = format!("{}/efetch.fcgi", self.base_url);
        let id_list = ids.join(",");
        let response = self
            .http_client
            .get(&fetch_url)
            .query(&[
                ("db", "pubmed"),
                ("id", id_list.as_str()),
                ("retmode", "xml"),
                ("rettype", "abstract"),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::ExternalService(format!("efetch request failed: {}", e)))?;
        tokio::time::sleep(self.courtesy_delay).await;

        if !response.status().is_success() {
            return Err(ScoutError::ExternalService(format!(
                "efetch returned HTTP {}",
                response.status()
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| ScoutError::ExternalService(format!("efetch body unreadable: {}", e)))?;

        Ok(LiteratureReply {
            status: STATUS_SUCCESS.to_string(),
            articles: parse_articles(&xml)?,
        })
    }
}

/// Extract article records from an efetch XML document.
fn parse_articles(xml: &str) -> Result<Vec<ArticleRecord>, ScoutError> {
    let document = roxmltree::Document::parse(xml)
        .map_err(|e| ScoutError::DataParsing(format!("malformed efetch XML: {}", e)))?;

    let mut articles = Vec::new();
    for article in document
        .descendants()
        .filter(|n| n.has_tag_name("PubmedArticle"))
    {
        let pmid = article
            .descendants()
            .find(|n| n.has_tag_name("PMID"))
            .map(node_text)
            .unwrap_or_else(|| "N/A".to_string());

        let title = article
            .descendants()
            .find(|n| n.has_tag_name("ArticleTitle"))
            .map(node_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No Title Available".to_string());

        let sections: Vec<String> = article
            .descendants()
            .filter(|n| n.has_tag_name("AbstractText"))
            .map(node_text)
            .filter(|s| !s.is_empty())
            .collect();
        let abstract_text = if sections.is_empty() {
            "No Abstract Available".to_string()
        } else {
            sections.join("\n")
        };

        articles.push(ArticleRecord {
            pmid,
            title,
            abstract_text,
        });
    }

    Ok(articles)
}

/// Concatenated text content of a node, including nested markup
/// (italics in titles, labelled abstract sections).
fn node_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl Capability for PubMedSearch {
    fn name(&self) -> &'static str {
        "pubmed_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Searches PubMed for a specific query and returns structured article data \
             (title, abstract, PMID).",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "PubMed query string. Use parentheses for OR conditions, e.g. '(therapy OR treatment)'."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of articles to return."
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> Value {
        let query = match arguments.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q,
            _ => return error_payload("Missing required parameter: query"),
        };
        let max_results = arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.default_max_results);

        match self.search(query, max_results).await {
            Ok(reply) => serde_json::to_value(&reply)
                .unwrap_or_else(|e| error_payload(format!("PubMed search failed: {}", e))),
            Err(e) => error_payload(format!("PubMed search failed: {}", e)),
        }
    }
}
