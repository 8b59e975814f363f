//! Aggregate type curve: one decline fitted to the average of many wells
//!
//! Each well is re-indexed to its own first period, rates are averaged per
//! period index across the wells producing in that period, and the averaged
//! series is smoothed and fitted like a single well. Outlier rejection and
//! change-point segmentation are not applied to the aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DeclinePipeline, PipelineError, WellSeries};
use crate::conditioning::SignalConditioner;
use crate::config::{ChangepointConfig, ConditioningConfig, OutlierConfig};
use crate::estimation::ParameterEstimator;
use crate::types::{FitResult, Product, RateSeries, SegmentRole, ValidationReport};
use crate::validation::FitValidator;

/// Averaged rate at one period index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeCurvePoint {
    pub t: u32,
    pub mean_rate: f64,
    /// Wells with production in this period
    pub well_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCurve {
    pub product: Product,
    /// Distinct wells that contributed
    pub wells: usize,
    pub points: Vec<TypeCurvePoint>,
    pub fit: FitResult,
    pub validation: ValidationReport,
}

/// Average the re-indexed series of every well producing `product`
pub fn aggregate(wells: &[WellSeries], product: Product) -> Vec<TypeCurvePoint> {
    let mut buckets: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for well in wells.iter().filter(|w| w.product == product) {
        for p in well.series.rebased().points() {
            let entry = buckets.entry(p.t).or_insert((0.0, 0));
            entry.0 += p.rate;
            entry.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(t, (sum, count))| TypeCurvePoint {
            t,
            mean_rate: sum / count as f64,
            well_count: count,
        })
        .collect()
}

impl DeclinePipeline<'_> {
    /// Fit one type curve for `product` across `wells`
    pub fn fit_type_curve(
        &self,
        wells: &[WellSeries],
        product: Product,
    ) -> Result<TypeCurve, PipelineError> {
        let points = aggregate(wells, product);
        if points.is_empty() {
            return Err(PipelineError::NoWells(product));
        }
        let well_count = wells.iter().filter(|w| w.product == product).count();

        let times: Vec<u32> = points.iter().map(|p| p.t).collect();
        let rates: Vec<f64> = points.iter().map(|p| p.mean_rate).collect();
        let averaged = RateSeries::from_parts(&times, &rates)?;

        let config = self.config();
        let conditioning = ConditioningConfig {
            outliers: OutlierConfig {
                enabled: false,
                ..config.conditioning.outliers.clone()
            },
            changepoint: ChangepointConfig {
                enabled: false,
                ..config.conditioning.changepoint.clone()
            },
            segment_role: SegmentRole::All,
            ..config.conditioning.clone()
        };
        let conditioned = SignalConditioner::condition(&averaged, &conditioning)?;

        let fit = ParameterEstimator::new(config).fit(product, &conditioned)?;
        let validation = FitValidator::new(&config.validation, config.fitting.periods_per_year)
            .validate(
                &format!("type_curve_{product}"),
                &conditioned.series,
                &fit,
                config.product(product).monotonicity,
            )?;

        info!(
            product = %product,
            wells = well_count,
            periods = points.len(),
            dei = fit.params.dei,
            b = fit.params.b,
            r2 = fit.goodness.r2,
            "Type curve fitted"
        );

        Ok(TypeCurve {
            product,
            wells: well_count,
            points,
            fit,
            validation,
        })
    }
}
