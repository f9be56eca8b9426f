//! Run state: the FIFO work queue and the accumulated reports.
//!
//! The queue shrinks monotonically and the report list is append-only;
//! every popped item is eventually recorded, so the counts always add
//! back up to the initial variant count.

use crate::models::{VariantReport, WorkItem};
use std::collections::VecDeque;

/// Owned exclusively by the queue controller; no other component touches
/// the pending queue or the accumulated reports.
#[derive(Debug, Default)]
pub struct RunState {
    pending: VecDeque<WorkItem>,
    reports: Vec<VariantReport>,
    in_flight: usize,
    initial_count: usize,
}

impl RunState {
    pub fn new(items: Vec<WorkItem>) -> Self {
        let initial_count = items.len();
        Self {
            pending: items.into(),
            reports: Vec::with_capacity(initial_count),
            in_flight: 0,
            initial_count,
        }
    }

    /// Pop the next work item in strict arrival order.
    pub fn next(&mut self) -> Option<WorkItem> {
        let item = self.pending.pop_front();
        if item.is_some() {
            self.in_flight += 1;
        }
        item
    }

    /// Record the report for the most recently popped item.
    pub fn record(&mut self, report: VariantReport) {
        debug_assert!(self.in_flight > 0, "record() without a matching next()");
        self.in_flight = self.in_flight.saturating_sub(1);
        self.reports.push(report);
        debug_assert!(self.is_consistent());
    }

    /// Conservation invariant over the whole run.
    pub fn is_consistent(&self) -> bool {
        self.reports.len() + self.pending.len() + self.in_flight == self.initial_count
    }

    #[allow(dead_code)] // Observability accessor
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    /// Final aggregation: the accumulated reports, input order preserved.
    pub fn into_reports(self) -> Vec<VariantReport> {
        self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::test_item;
    use crate::models::Variant;

    fn items(genes: &[&str]) -> Vec<WorkItem> {
        genes
            .iter()
            .map(|g| {
                let mut item = test_item("N/A", "Oncogenic");
                item.variant = Variant {
                    gene: g.to_string(),
                    ..item.variant
                };
                item
            })
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut state = RunState::new(items(&["BRAF", "TP53", "KRAS"]));
        assert_eq!(state.next().unwrap().variant.gene, "BRAF");
        state.record(VariantReport::placeholder(&test_item("N/A", "Neutral")));
        assert_eq!(state.next().unwrap().variant.gene, "TP53");
        state.record(VariantReport::placeholder(&test_item("N/A", "Neutral")));
        assert_eq!(state.next().unwrap().variant.gene, "KRAS");
    }

    #[test]
    fn test_conservation_invariant() {
        let mut state = RunState::new(items(&["BRAF", "TP53"]));
        assert!(state.is_consistent());

        let item = state.next().unwrap();
        assert!(state.is_consistent());
        state.record(VariantReport::placeholder(&WorkItem {
            variant: item.variant,
            cancer_type: item.cancer_type,
        }));
        assert!(state.is_consistent());
        assert_eq!(state.report_count() + state.pending_count(), 2);
    }

    #[test]
    fn test_exhaustion_matches_initial_count() {
        let mut state = RunState::new(items(&["A", "B", "C"]));
        while let Some(item) = state.next() {
            state.record(VariantReport::placeholder(&item));
        }
        assert_eq!(state.report_count(), state.initial_count());
        assert!(state.next().is_none());
        assert_eq!(state.into_reports().len(), 3);
    }
}
