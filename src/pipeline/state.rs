//! Per-well outcomes and batch summary
//!
//! Everything the pipeline hands back is plain serializable data; a failed
//! well is a `WellOutcome` with a sentinel status, never a panic or an
//! aborted batch.

use serde::{Deserialize, Serialize};

use crate::forecast::Forecast;
use crate::types::{FitResult, FixedQi, Product, RateSeries, Segment, ValidationReport};

// ============================================================================
// Input
// ============================================================================

/// One unit of batch work: a well's production of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellSeries {
    pub well_id: String,
    pub product: Product,
    pub series: RateSeries,
}

impl WellSeries {
    pub fn new(well_id: impl Into<String>, product: Product, series: RateSeries) -> Self {
        Self {
            well_id: well_id.into(),
            product,
            series,
        }
    }
}

// ============================================================================
// Per-well outcome
// ============================================================================

/// Terminal state of one well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellStatus {
    /// Fit produced (validation may still carry warnings)
    Fitted,
    /// Not fittable: too few points or already below the economic limit
    Skipped,
    /// Optimizer, strict validation or configuration failure
    Failed,
}

impl std::fmt::Display for WellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WellStatus::Fitted => write!(f, "fitted"),
            WellStatus::Skipped => write!(f, "skipped"),
            WellStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the conditioner did to the raw series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditioningSummary {
    pub input_points: usize,
    /// Conditioned series (re-indexed to t = 0) that was fitted
    pub series: RateSeries,
    pub qi: FixedQi,
    pub removed_outliers: Vec<usize>,
    pub regimes: usize,
    pub segment: Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellOutcome {
    pub well_id: String,
    pub product: Product,
    pub status: WellStatus,
    pub conditioning: Option<ConditioningSummary>,
    pub fit: Option<FitResult>,
    pub validation: Option<ValidationReport>,
    pub forecast: Option<Forecast>,
    /// Itemised warnings and errors for this well
    pub diagnostics: Vec<String>,
}

impl WellOutcome {
    /// Empty outcome for a well that has not been processed yet
    pub(crate) fn pending(well: &WellSeries) -> Self {
        Self {
            well_id: well.well_id.clone(),
            product: well.product,
            status: WellStatus::Failed,
            conditioning: None,
            fit: None,
            validation: None,
            forecast: None,
            diagnostics: Vec::new(),
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Fitted wells whose validation reported at least one failed check
    pub flagged: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[WellOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.status {
                WellStatus::Fitted => {
                    summary.succeeded += 1;
                    if outcome.validation.as_ref().is_some_and(|r| !r.overall_pass) {
                        summary.flagged += 1;
                    }
                }
                WellStatus::Skipped => summary.skipped += 1,
                WellStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch: {} wells, {} fitted ({} flagged), {} skipped, {} failed",
            self.total, self.succeeded, self.flagged, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// One outcome per input, in input order
    pub outcomes: Vec<WellOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(outcomes: Vec<WellOutcome>) -> Self {
        let summary = BatchSummary::from_outcomes(&outcomes);
        Self { outcomes, summary }
    }

    /// Every diagnostic line prefixed with its well and product
    pub fn diagnostics(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .flat_map(|o| {
                o.diagnostics
                    .iter()
                    .map(move |d| format!("{} [{}]: {}", o.well_id, o.product, d))
            })
            .collect()
    }

    pub fn outcome(&self, well_id: &str, product: Product) -> Option<&WellOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.well_id == well_id && o.product == product)
    }
}
