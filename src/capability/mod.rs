//! Lookup capabilities available to the research loop.
//!
//! A capability is an external lookup function the reasoning service can
//! request by name. Each one parses its own arguments, performs the
//! lookup, and returns a structured JSON payload; failures are encoded as
//! `{"status": "error", ...}` payloads rather than surfaced as faults, so
//! the research loop can continue and let the next reasoning step adapt.

pub mod pubmed;
pub mod trials;

pub use pubmed::PubMedSearch;
pub use trials::ClinicalTrialsSearch;

use crate::config::ResearchConfig;
use crate::error::ScoutError;
use crate::llm::InvocationRequest;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Tool definition advertised to the reasoning service.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// Structured error payload returned in place of a lookup result.
pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

/// An external lookup function callable by the research loop.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    /// Execute with the arguments requested by the reasoning service.
    /// Never fails: errors come back as structured payloads.
    async fn invoke(&self, arguments: &Value) -> Value;
}

/// The set of capabilities offered to one run, dispatched by name.
/// Explicitly constructed and injected; there is no process-wide catalog.
pub struct CapabilityCatalog {
    capabilities: Vec<Box<dyn Capability>>,
}

impl CapabilityCatalog {
    pub fn new(capabilities: Vec<Box<dyn Capability>>) -> Self {
        Self { capabilities }
    }

    /// The standard catalog: literature search and trial search.
    pub fn standard(config: &ResearchConfig) -> Result<Self, ScoutError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.lookup_timeout_seconds))
            .build()
            .map_err(|e| {
                ScoutError::Configuration(format!("failed to build lookup HTTP client: {}", e))
            })?;

        let delay = Duration::from_millis(config.lookup_delay_ms);
        Ok(Self::new(vec![
            Box::new(PubMedSearch::new(
                http_client.clone(),
                config.max_results,
                delay,
            )),
            Box::new(ClinicalTrialsSearch::new(
                http_client,
                config.max_results,
                delay,
            )),
        ]))
    }

    /// Tool definitions for the reasoning service request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities.iter().map(|c| c.definition()).collect()
    }

    /// Execute one invocation request and return its payload.
    pub async fn dispatch(&self, request: &InvocationRequest) -> Value {
        debug!(
            "Dispatching capability: {} with args: {}",
            request.name, request.arguments
        );

        match self
            .capabilities
            .iter()
            .find(|c| c.name() == request.name)
        {
            Some(capability) => capability.invoke(&request.arguments).await,
            None => error_payload(format!("Unknown capability: {}", request.name)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process capability stubs shared by engine tests.

    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed payload and records every argument object it saw.
    pub(crate) struct StaticCapability {
        name: &'static str,
        payload: Value,
        pub calls: Mutex<Vec<Value>>,
    }

    impl StaticCapability {
        pub(crate) fn new(name: &'static str, payload: Value) -> Self {
            Self {
                name,
                payload,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Capability for StaticCapability {
        fn name(&self) -> &'static str {
            self.name
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function(
                self.name,
                "test capability",
                json!({"type": "object", "properties": {}}),
            )
        }

        async fn invoke(&self, arguments: &Value) -> Value {
            self.calls.lock().unwrap().push(arguments.clone());
            self.payload.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticCapability;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_unknown_capability() {
        let catalog = CapabilityCatalog::new(vec![]);
        let request = InvocationRequest {
            id: "call_0".to_string(),
            name: "no_such_tool".to_string(),
            arguments: json!({}),
        };
        let payload = catalog.dispatch(&request).await;
        assert_eq!(payload["status"], "error");
        assert!(payload["message"].as_str().unwrap().contains("no_such_tool"));
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_name() {
        let catalog = CapabilityCatalog::new(vec![
            Box::new(StaticCapability::new("a", json!({"status": "success", "from": "a"}))),
            Box::new(StaticCapability::new("b", json!({"status": "success", "from": "b"}))),
        ]);
        let request = InvocationRequest {
            id: "call_0".to_string(),
            name: "b".to_string(),
            arguments: json!({"q": 1}),
        };
        let payload = catalog.dispatch(&request).await;
        assert_eq!(payload["from"], "b");
    }

    #[test]
    fn test_tool_definition_serialization() {
        let def = ToolDefinition::function(
            "pubmed_search",
            "Search PubMed",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        );
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "pubmed_search");
    }
}
