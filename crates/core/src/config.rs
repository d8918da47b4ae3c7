use crate::analysis::allocator::Rounding;
use crate::analysis::kmeans::KMeansOptions;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub sentry_dsn: Option<String>,
    pub port: u16,
}

const DEFAULT_PORT: u16 = 5000;

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            sentry_dsn: std::env::var("SENTRY_DSN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            port: env_parse("PORT").unwrap_or(DEFAULT_PORT),
        })
    }
}

/// Record-count tier selecting the minimum support for association mining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportTier {
    pub min_records: usize,
    pub min_support: f64,
}

/// Every threshold the pipeline uses.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Exponential decay base for month weights. Higher keeps older months relevant longer.
    pub decay: f64,
    /// Share of the weighted average in the blended next-month estimate.
    pub blend_alpha: f64,
    /// Months chained forward by the regression forecasts.
    pub forecast_months: usize,
    pub min_r2: f64,
    pub min_correlation: f64,
    /// Polynomial degree of the regression, 1 or 2.
    pub regression_degree: usize,
    pub min_weighted_points: usize,
    pub min_regression_points: usize,
    /// Minimum record count before any statistical analysis runs on a set.
    pub min_records: usize,
    /// Distinct current categories needed for variability and deviation analysis.
    pub min_trend_categories: usize,
    /// Checked in order; the first tier whose `min_records` is met wins.
    pub support_tiers: Vec<SupportTier>,
    pub min_confidence: f64,
    pub min_lift: f64,
    pub kmeans: KMeansOptions,
    /// Categories named by the high-spending cluster insight.
    pub top_cluster_categories: usize,
    pub limit_rounding: Rounding,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            decay: 0.9,
            blend_alpha: 0.9,
            forecast_months: 12,
            min_r2: 0.5,
            min_correlation: 0.5,
            regression_degree: 1,
            min_weighted_points: 2,
            min_regression_points: 3,
            min_records: 5,
            min_trend_categories: 3,
            support_tiers: vec![
                SupportTier {
                    min_records: 30,
                    min_support: 0.10,
                },
                SupportTier {
                    min_records: 20,
                    min_support: 0.15,
                },
                SupportTier {
                    min_records: 10,
                    min_support: 0.25,
                },
            ],
            min_confidence: 0.3,
            min_lift: 1.0,
            kmeans: KMeansOptions::default(),
            top_cluster_categories: 4,
            limit_rounding: Rounding::CorrectResidual,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overridden by `ANALYSIS_*` variables. Out-of-range values are ignored.
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(v) = env_parse::<f64>("ANALYSIS_DECAY").filter(|v| *v > 0.0 && *v <= 1.0) {
            out.decay = v;
        }
        if let Some(v) =
            env_parse::<f64>("ANALYSIS_BLEND_ALPHA").filter(|v| (0.0..=1.0).contains(v))
        {
            out.blend_alpha = v;
        }
        if let Some(v) = env_parse::<usize>("ANALYSIS_FORECAST_MONTHS").filter(|v| *v <= 120) {
            out.forecast_months = v;
        }
        if let Some(v) = env_parse::<f64>("ANALYSIS_MIN_R2") {
            out.min_r2 = v;
        }
        if let Some(v) = env_parse::<f64>("ANALYSIS_MIN_CORRELATION") {
            out.min_correlation = v;
        }
        if let Some(v) =
            env_parse::<usize>("ANALYSIS_REGRESSION_DEGREE").filter(|v| (1..=2).contains(v))
        {
            out.regression_degree = v;
        }
        if let Some(v) = env_parse::<usize>("ANALYSIS_MIN_RECORDS").filter(|v| *v >= 1) {
            out.min_records = v;
        }
        if let Some(v) = env_parse::<u64>("ANALYSIS_KMEANS_SEED") {
            out.kmeans.seed = v;
        }

        out
    }

    /// Minimum support for `records` current expenses, or `None` below every tier.
    pub fn min_support_for(&self, records: usize) -> Option<f64> {
        self.support_tiers
            .iter()
            .find(|t| records >= t.min_records)
            .map(|t| t.min_support)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
