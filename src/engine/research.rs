//! Bounded research loop for one variant.
//!
//! An explicit two-state machine: `Thinking` asks the reasoning service
//! for the next move, `Acting` executes exactly one capability
//! invocation. The loop terminates when a thinking step produces no
//! invocation request, or when the configured step bound forces
//! completion with whatever narrative text exists.

use crate::capability::CapabilityCatalog;
use crate::error::ScoutError;
use crate::llm::{AssistantTurn, ChatMessage, InvocationRequest, ReasoningService};
use crate::models::WorkItem;
use tracing::{debug, info, warn};

/// Drives one variant's investigation. Holds no state between runs; the
/// transcript lives and dies with a single `run` call.
pub struct ResearchLoop<'a> {
    reasoner: &'a dyn ReasoningService,
    catalog: &'a CapabilityCatalog,
    max_steps: usize,
}

/// Completed loop: the full transcript, the final narrative, and how the
/// loop ended.
#[derive(Debug)]
pub struct ResearchOutcome {
    pub transcript: Vec<ChatMessage>,
    pub narrative: String,
    pub reasoning_steps: usize,
    pub bound_hit: bool,
}

/// What the engine does with one assistant turn. Decided here, by
/// matching the turn's shape exhaustively, not by probing optional
/// attributes at call sites.
enum Decision {
    Narrative(String),
    Invoke(InvocationRequest),
}

/// Only the first invocation request per step is honored; extras are
/// dropped with a warning, keeping the one-capability-per-step sequence.
fn decide(turn: &AssistantTurn) -> Decision {
    match turn.invocations.split_first() {
        None => Decision::Narrative(turn.text.clone()),
        Some((first, rest)) => {
            if !rest.is_empty() {
                warn!(
                    "Reasoning service requested {} invocations in one step; dropping {}",
                    turn.invocations.len(),
                    rest.len()
                );
            }
            Decision::Invoke(first.clone())
        }
    }
}

enum LoopState {
    Thinking,
    Acting(InvocationRequest),
    Done,
}

impl<'a> ResearchLoop<'a> {
    pub fn new(
        reasoner: &'a dyn ReasoningService,
        catalog: &'a CapabilityCatalog,
        max_steps: usize,
    ) -> Self {
        Self {
            reasoner,
            catalog,
            max_steps,
        }
    }

    /// Run the loop to completion from a seed brief.
    ///
    /// Errors only on reasoning-service failure (after its own retries);
    /// capability failures are folded into the transcript as structured
    /// error payloads and the loop continues.
    pub async fn run(&self, brief: String) -> Result<ResearchOutcome, ScoutError> {
        let mut transcript = vec![ChatMessage::user(brief)];
        let tools = self.catalog.definitions();

        let mut state = LoopState::Thinking;
        let mut narrative = String::new();
        let mut reasoning_steps = 0;
        let mut bound_hit = false;

        loop {
            state = match state {
                LoopState::Thinking => {
                    if reasoning_steps >= self.max_steps {
                        warn!(
                            "Research loop hit the {}-step bound; forcing completion",
                            self.max_steps
                        );
                        bound_hit = true;
                        LoopState::Done
                    } else {
                        reasoning_steps += 1;
                        let turn = self.reasoner.complete(&transcript, &tools).await?;
                        if !turn.text.is_empty() {
                            debug!("Reasoning step {}: {}", reasoning_steps, turn.text);
                        }
                        transcript.push(turn.message.clone());

                        match decide(&turn) {
                            Decision::Narrative(text) => {
                                narrative = text;
                                LoopState::Done
                            }
                            Decision::Invoke(request) => {
                                // Best-effort narrative in case the bound
                                // cuts the loop short later.
                                if !turn.text.is_empty() {
                                    narrative = turn.text.clone();
                                }
                                LoopState::Acting(request)
                            }
                        }
                    }
                }
                LoopState::Acting(request) => {
                    info!("Invoking capability: {}", request.name);
                    let payload = self.catalog.dispatch(&request).await;
                    transcript.push(ChatMessage::tool_result(&request.name, &request.id, &payload));
                    LoopState::Thinking
                }
                LoopState::Done => break,
            };
        }

        Ok(ResearchOutcome {
            transcript,
            narrative,
            reasoning_steps,
            bound_hit,
        })
    }
}

/// Seed brief for one variant's investigation: baseline facts, the staged
/// search workflow, tool usage rules, and the required report structure.
pub fn task_brief(item: &WorkItem) -> String {
    let gene = &item.variant.gene;
    let protein = &item.variant.protein_change;
    let cancer = &item.cancer_type;

    format!(
        "You are an expert oncology researcher. Your mission is to uncover all relevant \
         therapeutic evidence for the variant **{gene} {protein}** in **{cancer}**.\n\
         You must follow a strict, function-driven workflow.\n\n\
         **--- Baseline Information ---**\n\
         - **Known Mutation Effect:** {effect}\n\
         - **Mutation Effect Description:** {effect_description}\n\
         Use this information as your starting point.\n\n\
         **--- Workflow ---**\n\n\
         **Phase 1: Functional Characterization & Variant-Level Evidence**\n\
         1. **Goal:** Confirm the variant's function (GoF/LoF) and find any direct therapeutic \
         evidence for this specific variant.\n\
         2. **Action A (Specific Cancer):** Perform a `pubmed_search` for \
         `'{gene} AND {protein} AND ({cancer})'`.\n\
         3. **Action B (Pan-Cancer):** Perform a `pubmed_search` for \
         `'{gene} AND {protein} AND (tumor OR cancer)'`.\n\
         4. **Analysis:** After reviewing results from BOTH searches, you MUST declare a \
         definitive conclusion in your thoughts. If the function remains unknown, your mission \
         is complete, immediately stop.\n\
         5. **Follow-up Validation:** If any specific drugs are mentioned, immediately test them \
         using `query_clinical_trials`.\n\n\
         **Phase 2: Gene-Focused Search (Specific Cancer)**\n\
         1. **Goal:** Find therapies targeting `{gene}` within `({cancer})`.\n\
         2. **Action:** Perform a `pubmed_search` using \
         `'{gene} AND ({cancer}) AND (therapy OR treatment OR inhibitor)'`.\n\
         3. **Critical Analysis:** You MUST look for mentioned drugs and downstream pathways. \
         These are new hypotheses.\n\
         4. **Follow-up Validation:** Immediately test ALL new hypotheses using \
         `query_clinical_trials`.\n\n\
         **Phase 3: Gene-Focused Search (Pan-Cancer)**\n\
         1. **Goal:** Find therapies for `{gene}` with pan-cancer approval or strong evidence in \
         other cancers.\n\
         2. **Action:** Perform a `pubmed_search` using \
         `'{gene} AND (cancer OR tumor) AND (therapy OR inhibitor)'`.\n\
         3. **Critical Analysis:** Identify drugs with pan-cancer relevance.\n\
         4. **Follow-up Validation:** Immediately test these pan-cancer hypotheses using \
         `query_clinical_trials`.\n\n\
         **Phase 4: Mechanistic Deep Dive**\n\
         1. **Goal:** Uncover therapies based on the gene's biological function, both within \
         `{cancer}` and across other cancers.\n\
         2. **Action A (Specific Cancer):** Perform a creative `pubmed_search` based on the \
         gene's role within the patient's cancer, informed by your GoF/LoF conclusion.\n\
         3. **Action B (Pan-Cancer):** Broaden the mechanistic search to find evidence of the \
         same therapeutic strategy in other cancers, linking it to the gene.\n\
         4. **Follow-up Validation:** Test any final hypotheses from BOTH searches with \
         `query_clinical_trials`.\n\n\
         **--- Tool Usage Rules ---**\n\
         1. **Think Step-by-Step:** Before every tool call, you MUST output your thought \
         process, starting with a brief summary of the previous action's result (list the PMIDs \
         or NCT ids found), then your reasoning for the next action.\n\
         2. **Single Tool Per Action:** You MUST call only one tool in a single thinking step. \
         Do not issue multiple tool calls at once. Plan your steps sequentially.\n\
         3. **`pubmed_search`:** For 'OR' conditions, you MUST use parentheses: \
         `(therapy OR treatment)`. Always set `max_results` to 20.\n\
         4. **`query_clinical_trials`:** You MUST use structured parameters (`intervention`, \
         `condition`). If a specific search fails or returns no results, DO NOT give up; broaden \
         the search by calling the tool with only one parameter. Always set `max_results` to 20.\n\n\
         **--- Final Report Structure ---**\n\
         Your final thought process MUST be a mini-review with the following sections:\n\n\
         **1. Executive Summary:** 1-2 key sentences on the therapeutic findings.\n\n\
         **2. Evidence Synthesis:** Group your curated findings by therapeutic strategy or drug \
         class, driven by biological and mechanistic reasoning. For each finding, state the \
         therapeutic hypothesis, describe the supporting evidence and its strength (preclinical, \
         case report, Phase III trial), and **cite your sources in-line**, like this: \
         (PMID: 12345678, NCT: NCT01234567). Every PMID and NCT cited here MUST also be present \
         in the final Curated Evidence Lists below.\n\n\
         **3. Conclusion:** Briefly summarize clinical actionability.\n\n\
         **4. Curated Evidence Lists (CRITICAL INSTRUCTION):** End your report with these exact \
         lines; 'relevant' means the id directly supports a therapeutic action discussed in your \
         synthesis, and the ids here must be identical to the ids cited in the text. If no such \
         evidence was found the lists MUST be empty `[]`.\n\
         `Relevant PMIDs: [\"PMID1\", \"PMID2\"]`\n\
         `Relevant NCTs: [\"NCT_ID1\", \"NCT_ID2\"]`",
        gene = gene,
        protein = protein,
        cancer = cancer,
        effect = item.variant.mutation_effect,
        effect_description = item.variant.mutation_effect_description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::testing::StaticCapability;
    use crate::llm::testing::{invocation_turn, narrative_turn, ScriptedReasoner};
    use crate::models::test_support::test_item;
    use serde_json::json;
    use std::sync::Arc;

    fn catalog_with(capability: Arc<StaticCapability>) -> CapabilityCatalog {
        struct Shared(Arc<StaticCapability>);

        #[async_trait::async_trait]
        impl crate::capability::Capability for Shared {
            fn name(&self) -> &'static str {
                self.0.name()
            }
            fn definition(&self) -> crate::capability::ToolDefinition {
                self.0.definition()
            }
            async fn invoke(&self, arguments: &serde_json::Value) -> serde_json::Value {
                self.0.invoke(arguments).await
            }
        }

        CapabilityCatalog::new(vec![Box::new(Shared(capability))])
    }

    fn success_payload() -> serde_json::Value {
        json!({"status": "success", "articles": []})
    }

    #[tokio::test]
    async fn test_terminates_on_first_narrative() {
        let reasoner = ScriptedReasoner::new(vec![narrative_turn("Function unknown; stopping.")]);
        let catalog = CapabilityCatalog::new(vec![]);
        let research = ResearchLoop::new(&reasoner, &catalog, 10);

        let outcome = research.run("brief".to_string()).await.unwrap();
        assert_eq!(outcome.narrative, "Function unknown; stopping.");
        assert_eq!(outcome.reasoning_steps, 1);
        assert!(!outcome.bound_hit);
        // Seed + one assistant message.
        assert_eq!(outcome.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_alternates_thinking_and_acting() {
        let capability = Arc::new(StaticCapability::new("pubmed_search", success_payload()));
        let reasoner = ScriptedReasoner::new(vec![
            invocation_turn(
                "Searching the literature.",
                &[("pubmed_search", json!({"query": "KRAS G12C"}))],
            ),
            narrative_turn("Final synthesis (PMID: 31452104)."),
        ]);
        let catalog = catalog_with(capability.clone());
        let research = ResearchLoop::new(&reasoner, &catalog, 10);

        let outcome = research.run("brief".to_string()).await.unwrap();
        assert_eq!(capability.call_count(), 1);
        assert_eq!(outcome.reasoning_steps, 2);
        assert_eq!(outcome.narrative, "Final synthesis (PMID: 31452104).");

        // Seed, assistant(invocation), tool result, assistant(narrative).
        assert_eq!(outcome.transcript.len(), 4);
        let tool_msg = &outcome.transcript[2];
        assert!(tool_msg.is_tool_result());
        assert_eq!(tool_msg.name.as_deref(), Some("pubmed_search"));
    }

    #[tokio::test]
    async fn test_only_first_invocation_per_step_is_honored() {
        let capability = Arc::new(StaticCapability::new("pubmed_search", success_payload()));
        let reasoner = ScriptedReasoner::new(vec![
            invocation_turn(
                "Two at once.",
                &[
                    ("pubmed_search", json!({"query": "first"})),
                    ("pubmed_search", json!({"query": "second"})),
                ],
            ),
            narrative_turn("Done."),
        ]);
        let catalog = catalog_with(capability.clone());
        let research = ResearchLoop::new(&reasoner, &catalog, 10);

        research.run("brief".to_string()).await.unwrap();
        let calls = capability.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["query"], "first");
    }

    #[tokio::test]
    async fn test_step_bound_forces_done_with_best_effort_narrative() {
        let capability = Arc::new(StaticCapability::new("pubmed_search", success_payload()));
        // Never stops requesting lookups.
        let turns = (0..10)
            .map(|i| {
                invocation_turn(
                    &format!("Thought {}", i),
                    &[("pubmed_search", json!({"query": "more"}))],
                )
            })
            .collect();
        let reasoner = ScriptedReasoner::new(turns);
        let catalog = catalog_with(capability.clone());
        let research = ResearchLoop::new(&reasoner, &catalog, 3);

        let outcome = research.run("brief".to_string()).await.unwrap();
        assert!(outcome.bound_hit);
        assert_eq!(outcome.reasoning_steps, 3);
        assert_eq!(reasoner.call_count(), 3);
        assert_eq!(outcome.narrative, "Thought 2");
        // The partial transcript stays available for curation.
        assert_eq!(outcome.transcript.len(), 7);
    }

    #[tokio::test]
    async fn test_capability_failure_is_recovered_in_transcript() {
        // Catalog without the requested capability: dispatch yields a
        // structured error payload, and the loop keeps going.
        let reasoner = ScriptedReasoner::new(vec![
            invocation_turn("Try a lookup.", &[("pubmed_search", json!({"query": "x"}))]),
            narrative_turn("Adapted after the failure."),
        ]);
        let catalog = CapabilityCatalog::new(vec![]);
        let research = ResearchLoop::new(&reasoner, &catalog, 10);

        let outcome = research.run("brief".to_string()).await.unwrap();
        assert_eq!(outcome.narrative, "Adapted after the failure.");
        assert!(outcome.transcript[2].content.contains("\"error\""));
    }

    #[test]
    fn test_task_brief_mentions_variant_and_rules() {
        let brief = task_brief(&test_item("N/A", "Oncogenic"));
        assert!(brief.contains("KRAS p.G12C"));
        assert!(brief.contains("Melanoma"));
        assert!(brief.contains("Single Tool Per Action"));
        assert!(brief.contains("Relevant PMIDs"));
    }
}
