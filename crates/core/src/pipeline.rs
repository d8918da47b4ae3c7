//! Runs every analysis for a request and assembles the report.
//!
//! Each stage is gated on the amount of data it needs; a stage that is skipped simply leaves
//! its part of the report empty.

use crate::analysis::allocator::assign_limits;
use crate::analysis::association::{mine_rules, RuleThresholds};
use crate::analysis::clustering::{cluster_amounts, frequency_groups, spending_groups};
use crate::analysis::forecast::{
    forecast_by_category, forecast_total, project_current_month, with_projection, Blended,
    FitGate, MonthlyEstimator, RegressionForecast, RegressionOptions, WeightedAverage,
};
use crate::analysis::importance::label_categories;
use crate::analysis::trends::{most_variable_category, spending_deviations, weekday_peaks};
use crate::config::AnalysisConfig;
use crate::domain::contract::{AnalysisRequest, LabelRequest, ValidatedRequest};
use crate::domain::expense::{
    distinct_categories, excluding_period, latest_period, monthly_totals, totals_by_category,
    CategoryLimit,
};
use crate::domain::report::{AnalysisReport, LabelReport};
use crate::error::Result;
use std::collections::HashMap;

pub const GOAL_ROW: &str = "Goal";

pub fn analyze(request: AnalysisRequest, cfg: &AnalysisConfig) -> Result<AnalysisReport> {
    run_analysis(&request.validate_and_into_request()?, cfg)
}

pub fn label(request: LabelRequest, cfg: &AnalysisConfig) -> Result<LabelReport> {
    let past = request.validate_and_into_expenses()?;
    if past.len() < cfg.min_records {
        tracing::debug!(records = past.len(), "not enough history to label categories");
        return Ok(LabelReport::default());
    }
    Ok(LabelReport {
        labeled_categories: label_categories(&past),
    })
}

pub fn run_analysis(req: &ValidatedRequest, cfg: &AnalysisConfig) -> Result<AnalysisReport> {
    let current = &req.expenses;
    let current_period = latest_period(current);
    let history = excluding_period(&req.all_expenses, current_period);
    let enough_current = current.len() >= cfg.min_records;
    let enough_history = history.len() >= cfg.min_records;

    let mut report = AnalysisReport::default();

    report.category_limits.push(CategoryLimit {
        name: GOAL_ROW.to_string(),
        limit: req.goal_amount,
    });
    report.category_limits.extend(assign_limits(
        &req.categories,
        req.allowed_spending(),
        cfg.limit_rounding,
    )?);

    report.predicted_current_month = if enough_current {
        project_current_month(current)
    } else {
        None
    };

    report.advice = budget_advice(req, report.predicted_current_month);
    if let Some(msg) = overspending_advice(req, &report.category_limits) {
        report.advice.push(msg);
    }

    let regression = RegressionOptions {
        degree: cfg.regression_degree,
        decay: Some(cfg.decay),
        min_points: cfg.min_regression_points,
    };
    let gate = FitGate {
        min_r2: cfg.min_r2,
        min_correlation: cfg.min_correlation,
    };

    if enough_history {
        report.predictions = forecast_total(&history, &regression, &gate, cfg.forecast_months);
        report.category_predictions =
            forecast_by_category(&history, &regression, &gate, cfg.forecast_months);

        if enough_current {
            let series = match current_period {
                Some(period) => with_projection(
                    monthly_totals(&history),
                    period,
                    report.predicted_current_month,
                ),
                None => monthly_totals(&history),
            };
            let estimator = Blended {
                alpha: cfg.blend_alpha,
                primary: WeightedAverage {
                    decay: cfg.decay,
                    min_points: cfg.min_weighted_points,
                },
                secondary: RegressionForecast {
                    options: regression.clone(),
                    gate: Some(gate),
                },
            };
            report.predicted_next_month = estimator.estimate(&series);
        }
    } else {
        tracing::debug!(records = history.len(), "not enough history for forecasts");
    }

    if enough_current {
        if let Some(clusters) =
            cluster_amounts(current, &cfg.kmeans, cfg.top_cluster_categories)
        {
            if let Some(insight) = clusters.insight() {
                report.smart_insights.push(insight);
            }
            report.expenses_clustering = clusters.summaries;
        }
        report.spending_clustering = spending_groups(current, &cfg.kmeans);
        report.frequency_clustering = frequency_groups(current, &cfg.kmeans);
    }

    match cfg.min_support_for(current.len()) {
        Some(min_support) => {
            report.association_rules = mine_rules(
                current,
                &RuleThresholds {
                    min_support,
                    min_confidence: cfg.min_confidence,
                    min_lift: cfg.min_lift,
                },
            );
        }
        None => tracing::debug!(records = current.len(), "too few records for association rules"),
    }

    let enough_categories = distinct_categories(current).len() >= cfg.min_trend_categories;
    if enough_current && enough_categories {
        if let Some(v) = most_variable_category(current) {
            report.smart_insights.push(v.insight());
        }
        if enough_history {
            if let Some(insight) =
                spending_deviations(current, &history).and_then(|d| d.insight())
            {
                report.smart_insights.push(insight);
            }
        }
    }

    if enough_current {
        if let Some(peaks) = weekday_peaks(current) {
            report.smart_insights.push(peaks.insight());
        }
    }

    tracing::debug!(
        current = current.len(),
        history = history.len(),
        advice = report.advice.len(),
        insights = report.smart_insights.len(),
        rules = report.association_rules.len(),
        "analysis complete"
    );
    Ok(report)
}

/// Budget and goal warnings, most severe first.
pub fn budget_advice(req: &ValidatedRequest, projected: Option<f64>) -> Vec<String> {
    const EXCEEDED: &str = "You've exceeded your monthly budget!";
    const OVER_GOAL: &str = "You've spent more than your goal allows.";
    const WILL_EXCEED: &str = "Your spending is estimated to exceed your monthly budget.";
    const WILL_OVER_GOAL: &str = "Your spending is estimated to be more than what your goal allows.";
    const NO_GOAL: &str = "No goal was set for this month.";

    let budget = req.monthly_budget;
    let allowed = req.allowed_spending();
    let projected_over = |limit: f64| projected.is_some_and(|p| p > limit);

    let mut out = Vec::new();
    if req.goal_amount > 0.0 {
        if req.total_spent > budget {
            out.push(EXCEEDED);
        } else if req.total_spent > allowed {
            out.push(OVER_GOAL);
            if projected_over(budget) {
                out.push(WILL_EXCEED);
            }
        } else if projected_over(budget) {
            out.push(WILL_EXCEED);
        } else if projected_over(allowed) {
            out.push(WILL_OVER_GOAL);
        }
    } else {
        out.push(NO_GOAL);
        if req.total_spent > budget {
            out.push(EXCEEDED);
        } else if projected_over(budget) {
            out.push(WILL_EXCEED);
        }
    }
    out.into_iter().map(str::to_string).collect()
}

/// Names categories whose current spending is above their limit.
pub fn overspending_advice(req: &ValidatedRequest, limits: &[CategoryLimit]) -> Option<String> {
    let limit_of: HashMap<&str, f64> = limits.iter().map(|l| (l.name.as_str(), l.limit)).collect();
    let over: Vec<String> = totals_by_category(&req.expenses)
        .into_iter()
        .filter(|(category, total)| {
            limit_of
                .get(category.as_str())
                .is_some_and(|limit| total > limit)
        })
        .map(|(category, _)| category)
        .collect();
    if over.is_empty() {
        return None;
    }
    Some(format!(
        "You're overspending on '{}'. Stop spending to avoid risks.",
        over.join("', '")
    ))
}
