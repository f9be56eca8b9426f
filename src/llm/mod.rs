//! Reasoning service interface.
//!
//! This module defines the message transcript types shared by the engine
//! and the wire client, and the `ReasoningService` trait behind which the
//! actual generative endpoint sits. The engine never talks HTTP directly;
//! it is handed an injected implementation.

pub mod client;

pub use client::ReasoningClient;

use crate::capability::ToolDefinition;
use crate::error::ScoutError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Message in a research transcript. Serializes to the chat-completions
/// wire shape; tool arguments travel as JSON-encoded strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Capability name on tool-result messages; curation keys off this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallMessage {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

fn function_call_type() -> String {
    "function".to_string()
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallMessage>>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-result message carrying a capability's JSON payload.
    pub fn tool_result(name: impl Into<String>, call_id: impl Into<String>, payload: &Value) -> Self {
        Self {
            role: "tool".to_string(),
            content: payload.to_string(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == "tool"
    }
}

/// A single capability invocation requested by the reasoning service,
/// with its arguments already parsed out of the wire encoding.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One assistant turn: the raw transcript message plus the engine-facing
/// view of it (narrative text and any requested invocations).
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub message: ChatMessage,
    pub text: String,
    pub invocations: Vec<InvocationRequest>,
}

impl AssistantTurn {
    /// Build the engine-facing view from a wire assistant message.
    /// Unparseable argument strings degrade to an empty object; the
    /// capability will reject missing parameters itself.
    pub fn from_message(message: ChatMessage) -> Self {
        let text = message.content.clone();
        let invocations = message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    warn!(
                        "Unparseable arguments for {}: {}; treating as empty",
                        call.function.name, e
                    );
                    Value::Object(Default::default())
                });
                InvocationRequest {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments,
                }
            })
            .collect();
        Self {
            message,
            text,
            invocations,
        }
    }
}

/// Opaque generative decision function: transcript in, one assistant
/// turn out. Implemented by the HTTP client and by test stubs.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ScoutError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted reasoning stub shared by engine tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of assistant turns; once the script is
    /// exhausted it keeps returning plain narratives.
    pub(crate) struct ScriptedReasoner {
        turns: Mutex<VecDeque<AssistantTurn>>,
        pub calls: Mutex<usize>,
    }

    impl ScriptedReasoner {
        pub(crate) fn new(turns: Vec<AssistantTurn>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                calls: Mutex::new(0),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningService for ScriptedReasoner {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AssistantTurn, ScoutError> {
            *self.calls.lock().unwrap() += 1;
            let next = self.turns.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| narrative_turn("Done.")))
        }
    }

    /// Assistant turn with narrative text and no invocation request.
    pub(crate) fn narrative_turn(text: &str) -> AssistantTurn {
        AssistantTurn::from_message(ChatMessage::assistant(text, None))
    }

    /// Assistant turn requesting one or more capability invocations.
    pub(crate) fn invocation_turn(text: &str, calls: &[(&str, Value)]) -> AssistantTurn {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCallMessage {
                id: format!("call_{}", i),
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            })
            .collect();
        AssistantTurn::from_message(ChatMessage::assistant(text, Some(tool_calls)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_message_shape() {
        let payload = json!({"status": "success", "articles": []});
        let msg = ChatMessage::tool_result("pubmed_search", "call_0", &payload);
        assert!(msg.is_tool_result());
        assert_eq!(msg.name.as_deref(), Some("pubmed_search"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_0"));
        assert!(msg.content.contains("\"status\""));
    }

    #[test]
    fn test_assistant_turn_parses_arguments() {
        let message = ChatMessage::assistant(
            "Searching now.",
            Some(vec![ToolCallMessage {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name: "pubmed_search".to_string(),
                    arguments: r#"{"query":"BRAF V600E","max_results":20}"#.to_string(),
                },
            }]),
        );
        let turn = AssistantTurn::from_message(message);
        assert_eq!(turn.invocations.len(), 1);
        assert_eq!(turn.invocations[0].name, "pubmed_search");
        assert_eq!(turn.invocations[0].arguments["query"], "BRAF V600E");
    }

    #[test]
    fn test_assistant_turn_degrades_bad_arguments() {
        let message = ChatMessage::assistant(
            "",
            Some(vec![ToolCallMessage {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name: "pubmed_search".to_string(),
                    arguments: "not json".to_string(),
                },
            }]),
        );
        let turn = AssistantTurn::from_message(message);
        assert!(turn.invocations[0].arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_serialized_user_message_omits_empty_fields() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }
}
