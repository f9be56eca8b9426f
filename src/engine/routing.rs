//! Routing policy: does a variant need deep research?
//!
//! A pure decision over the baseline facts, evaluated in precedence
//! order. Variants the annotator already made actionable, and variants
//! classified as benign, skip the research loop entirely.

use crate::models::Variant;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Skip(SkipReason),
    DeepResearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The annotator already lists therapeutic options.
    BaselineDrugs,
    /// The variant is classified as (likely) benign.
    LikelyBenign,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BaselineDrugs => write!(f, "baseline annotation provided drugs"),
            SkipReason::LikelyBenign => write!(f, "variant is likely benign"),
        }
    }
}

/// First match wins; total over the variant value space, absent fields
/// are treated as absent and never panic.
pub fn route(variant: &Variant) -> Route {
    if variant.has_drugs() {
        info!(
            "Routing {}: skip deep search ({})",
            variant.label(),
            SkipReason::BaselineDrugs
        );
        return Route::Skip(SkipReason::BaselineDrugs);
    }

    if variant.oncogenicity.is_benign() {
        info!(
            "Routing {}: skip deep search ({})",
            variant.label(),
            SkipReason::LikelyBenign
        );
        return Route::Skip(SkipReason::LikelyBenign);
    }

    info!(
        "Routing {}: deep search (oncogenicity '{}', no drugs listed)",
        variant.label(),
        variant.oncogenicity
    );
    Route::DeepResearch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::test_variant;

    #[test]
    fn test_drugs_win_over_everything() {
        // Even a benign classification skips for the drug reason first.
        let variant = test_variant("Imatinib(sensitive, Level A Evidence)", "Neutral");
        assert_eq!(route(&variant), Route::Skip(SkipReason::BaselineDrugs));
    }

    #[test]
    fn test_benign_without_drugs_skips() {
        assert_eq!(
            route(&test_variant("N/A", "Neutral")),
            Route::Skip(SkipReason::LikelyBenign)
        );
        assert_eq!(
            route(&test_variant("", "Likely Neutral")),
            Route::Skip(SkipReason::LikelyBenign)
        );
    }

    #[test]
    fn test_actionable_without_drugs_goes_deep() {
        assert_eq!(route(&test_variant("N/A", "Oncogenic")), Route::DeepResearch);
        assert_eq!(
            route(&test_variant("N/A", "Likely Oncogenic")),
            Route::DeepResearch
        );
    }

    #[test]
    fn test_unknown_oncogenicity_goes_deep() {
        assert_eq!(route(&test_variant("N/A", "Unknown")), Route::DeepResearch);
        assert_eq!(route(&test_variant("", "")), Route::DeepResearch);
    }
}
