//! Orchestration engine: one variant at a time, start to finish.
//!
//! The controller pops work items in arrival order, routes each one, and
//! runs the deep-research pipeline (research loop, curation, synthesis)
//! for the variants that need it. Strictly sequential: a variant is
//! fully processed before the next is popped, and per-variant failures
//! degrade to error-marked rows instead of halting the batch.

pub mod curation;
pub mod queue;
pub mod research;
pub mod routing;
pub mod synthesizer;

pub use curation::{curate, CitationExtractor, RegexCitations};
pub use queue::RunState;
pub use research::{task_brief, ResearchLoop, ResearchOutcome};
pub use routing::{route, Route, SkipReason};
pub use synthesizer::ReportSynthesizer;

use crate::capability::CapabilityCatalog;
use crate::llm::ReasoningService;
use crate::models::{VariantReport, WorkItem};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum reasoning steps per research loop.
    pub max_steps: usize,
    /// Draw a progress bar over the variant queue.
    pub show_progress: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_steps: 40,
            show_progress: false,
        }
    }
}

/// The variant interpreter. All collaborators are injected: the
/// reasoning service, the capability catalog, and the citation
/// extraction strategy.
pub struct Engine<'a> {
    reasoner: &'a dyn ReasoningService,
    catalog: CapabilityCatalog,
    extractor: Box<dyn CitationExtractor>,
    options: EngineOptions,
}

impl<'a> Engine<'a> {
    pub fn new(
        reasoner: &'a dyn ReasoningService,
        catalog: CapabilityCatalog,
        options: EngineOptions,
    ) -> Self {
        Self {
            reasoner,
            catalog,
            extractor: Box::new(RegexCitations::new()),
            options,
        }
    }

    /// Swap the citation extraction strategy.
    #[allow(dead_code)] // Seam for stricter structured-citation schemes
    pub fn with_extractor(mut self, extractor: Box<dyn CitationExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Process every work item and return one report per item, input
    /// order preserved.
    pub async fn run(&self, items: Vec<WorkItem>) -> Vec<VariantReport> {
        let mut state = RunState::new(items);
        let progress = self.progress_bar(state.initial_count());

        while let Some(item) = state.next() {
            progress.set_message(item.variant.label());

            let report = match route(&item.variant) {
                Route::Skip(_) => VariantReport::placeholder(&item),
                Route::DeepResearch => self.deep_research(&item).await,
            };

            state.record(report);
            progress.inc(1);
        }

        progress.finish_and_clear();
        info!("Processed {} variants", state.report_count());
        state.into_reports()
    }

    /// The deep path: bounded research loop, evidence curation, then one
    /// synthesis call.
    async fn deep_research(&self, item: &WorkItem) -> VariantReport {
        let research = ResearchLoop::new(self.reasoner, &self.catalog, self.options.max_steps);

        let outcome = match research.run(task_brief(item)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Research loop failed for {}: {}", item.variant.label(), e);
                return VariantReport::error(item, &e.to_string());
            }
        };

        if outcome.bound_hit {
            info!(
                "{}: step bound reached after {} reasoning steps; continuing with partial narrative",
                item.variant.label(),
                outcome.reasoning_steps
            );
        }

        let curated = curate(
            &outcome.transcript,
            &outcome.narrative,
            self.extractor.as_ref(),
        );
        if curated.is_empty() {
            info!(
                "{}: no retrieved record survived citation grounding",
                item.variant.label()
            );
        } else {
            info!(
                "{}: curated {} articles and {} trials from the research transcript",
                item.variant.label(),
                curated.articles.len(),
                curated.trials.len()
            );
        }

        ReportSynthesizer::new(self.reasoner)
            .synthesize(item, &outcome.narrative)
            .await
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    }
}
