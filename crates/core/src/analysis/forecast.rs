//! Spending forecasts over daily and monthly aggregates.
//!
//! - [`project_current_month`] extrapolates the running month from its daily rate.
//! - [`WeightedAverage`], [`RegressionForecast`] and [`Blended`] estimate the month following a
//!   series of monthly totals and share the [`MonthlyEstimator`] seam.
//! - [`forecast_total`] and [`forecast_by_category`] chain the regression several months forward.

use crate::analysis::stats;
use crate::domain::expense::{monthly_totals, Expense, MonthlyTotal};
use crate::domain::report::ForecastPoint;
use crate::time::calendar::{days_in_month, YearMonth};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Projects the month's total from the spending rate observed so far.
///
/// `None` for an empty set.
pub fn project_current_month(expenses: &[Expense]) -> Option<f64> {
    let first = expenses.iter().map(|e| e.date).min()?;
    let last = expenses.iter().map(|e| e.date).max()?;

    let days_elapsed = (last - first).num_days() + 1;
    if days_elapsed <= 0 {
        return None;
    }

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let daily_rate = total / days_elapsed as f64;
    let month_days = i64::from(days_in_month(last.year(), last.month()));
    let remaining_days = (month_days - days_elapsed).max(0);

    Some(stats::round2(total + daily_rate * remaining_days as f64))
}

/// `decay^(n - i - 1)` for i in 0..n: the newest point weighs 1.
pub fn decay_weights(n: usize, decay: f64) -> Vec<f64> {
    (0..n).map(|i| decay.powi((n - i - 1) as i32)).collect()
}

/// Appends a projected month to a chronological series, replacing an existing entry for it.
pub fn with_projection(
    mut series: Vec<MonthlyTotal>,
    period: YearMonth,
    projected: Option<f64>,
) -> Vec<MonthlyTotal> {
    if let Some(amount) = projected {
        series.retain(|m| m.period != period);
        series.push(MonthlyTotal { period, amount });
        series.sort_by_key(|m| m.period);
    }
    series
}

/// Estimates the month that follows a chronological series of monthly totals.
pub trait MonthlyEstimator {
    fn name(&self) -> &'static str;

    fn estimate(&self, series: &[MonthlyTotal]) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct WeightedAverage {
    pub decay: f64,
    pub min_points: usize,
}

impl MonthlyEstimator for WeightedAverage {
    fn name(&self) -> &'static str {
        "weighted_average"
    }

    fn estimate(&self, series: &[MonthlyTotal]) -> Option<f64> {
        if series.len() < self.min_points.max(1) {
            return None;
        }
        let mut ordered = series.to_vec();
        ordered.sort_by_key(|m| m.period);

        let weights = decay_weights(ordered.len(), self.decay);
        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 {
            return None;
        }
        let weighted: f64 = ordered
            .iter()
            .zip(&weights)
            .map(|(m, w)| m.amount * w)
            .sum();
        Some(stats::round2(weighted / weight_sum))
    }
}

#[derive(Debug, Clone)]
pub struct RegressionOptions {
    /// 1 (linear) or 2 (quadratic).
    pub degree: usize,
    /// Sample-weight decay; `None` fits unweighted.
    pub decay: Option<f64>,
    pub min_points: usize,
}

impl Default for RegressionOptions {
    fn default() -> Self {
        Self {
            degree: 1,
            decay: Some(0.9),
            min_points: 3,
        }
    }
}

/// Minimum fit quality before a regression forecast is reported.
#[derive(Debug, Clone, Copy)]
pub struct FitGate {
    pub min_r2: f64,
    pub min_correlation: f64,
}

/// Polynomial least-squares fit of monthly totals against a standardized month index.
#[derive(Debug, Clone)]
pub struct RegressionFit {
    coefficients: Vec<f64>,
    x_center: f64,
    x_scale: f64,
    last: YearMonth,
    pub r2: f64,
    /// Correlation between fitted and actual values; `None` when the fit is flat.
    pub correlation: Option<f64>,
}

impl RegressionFit {
    pub fn fit(series: &[MonthlyTotal], opts: &RegressionOptions) -> Option<Self> {
        let degree = opts.degree.clamp(1, 2);
        if series.len() < opts.min_points.max(degree + 1) {
            return None;
        }
        let last = series.iter().map(|m| m.period).max()?;

        let xs: Vec<f64> = series.iter().map(|m| m.period.index() as f64).collect();
        let ys: Vec<f64> = series.iter().map(|m| m.amount).collect();
        let x_center = stats::mean(&xs)?;
        let x_scale = match stats::population_std(&xs)? {
            s if s > 0.0 => s,
            _ => return None,
        };

        // Weights follow chronological rank so that input order does not matter.
        let mut order: Vec<usize> = (0..series.len()).collect();
        order.sort_by_key(|&i| series[i].period);
        let mut ws = vec![1.0; series.len()];
        if let Some(decay) = opts.decay {
            for (rank, w) in decay_weights(series.len(), decay).into_iter().enumerate() {
                ws[order[rank]] = w;
            }
        }

        let zs: Vec<f64> = xs.iter().map(|x| (x - x_center) / x_scale).collect();
        let coefficients = weighted_least_squares(&zs, &ys, &ws, degree)?;

        let mut out = Self {
            coefficients,
            x_center,
            x_scale,
            last,
            r2: 0.0,
            correlation: None,
        };
        let fitted: Vec<f64> = zs.iter().map(|z| out.eval(*z)).collect();
        out.r2 = stats::r_squared(&ys, &fitted)?;
        out.correlation = stats::pearson(&ys, &fitted);
        Some(out)
    }

    fn eval(&self, z: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * z + c)
    }

    pub fn predict(&self, period: YearMonth) -> f64 {
        let z = (period.index() as f64 - self.x_center) / self.x_scale;
        self.eval(z)
    }

    pub fn passes(&self, gate: &FitGate) -> bool {
        self.r2 >= gate.min_r2
            && self
                .correlation
                .is_some_and(|c| c >= gate.min_correlation)
    }

    /// Chains `horizon` months after the last fitted month. Every point is floored at zero.
    pub fn forecast(&self, horizon: usize) -> Vec<ForecastPoint> {
        self.forecast_after(self.last, horizon)
    }

    /// Chains `horizon` months starting the month after `start`.
    pub fn forecast_after(&self, start: YearMonth, horizon: usize) -> Vec<ForecastPoint> {
        let mut period = start;
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            period = period.succ();
            out.push(ForecastPoint {
                year: period.year,
                month: period.month_name().to_string(),
                predicted_spending: stats::round2(self.predict(period).max(0.0)),
                accuracy: self.r2,
                correlation: self.correlation.unwrap_or(0.0),
            });
        }
        out
    }
}

/// Solves (XᵀWX)β = XᵀWy for the polynomial basis [1, z, z², ...].
fn weighted_least_squares(zs: &[f64], ys: &[f64], ws: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = degree + 1;
    let mut a = vec![vec![0.0; n + 1]; n];
    for ((z, y), w) in zs.iter().zip(ys).zip(ws) {
        let basis: Vec<f64> = (0..n).map(|p| z.powi(p as i32)).collect();
        for r in 0..n {
            for c in 0..n {
                a[r][c] += w * basis[r] * basis[c];
            }
            a[r][n] += w * basis[r] * y;
        }
    }

    // Gaussian elimination with partial pivoting on the augmented matrix.
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..=n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut beta = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * beta[k]).sum();
        beta[row] = (a[row][n] - tail) / a[row][row];
    }
    beta.iter().all(|b| b.is_finite()).then_some(beta)
}

#[derive(Debug, Clone)]
pub struct RegressionForecast {
    pub options: RegressionOptions,
    pub gate: Option<FitGate>,
}

impl MonthlyEstimator for RegressionForecast {
    fn name(&self) -> &'static str {
        "regression"
    }

    fn estimate(&self, series: &[MonthlyTotal]) -> Option<f64> {
        let fit = RegressionFit::fit(series, &self.options)?;
        if let Some(gate) = &self.gate {
            if !fit.passes(gate) {
                tracing::debug!(
                    estimator = self.name(),
                    r2 = fit.r2,
                    correlation = ?fit.correlation,
                    "fit below gate"
                );
                return None;
            }
        }
        let next = fit.last.succ();
        Some(stats::round2(fit.predict(next).max(0.0)))
    }
}

/// `alpha * primary + (1 - alpha) * secondary`, or whichever side is available.
#[derive(Debug, Clone)]
pub struct Blended<A, B> {
    pub alpha: f64,
    pub primary: A,
    pub secondary: B,
}

impl<A: MonthlyEstimator, B: MonthlyEstimator> MonthlyEstimator for Blended<A, B> {
    fn name(&self) -> &'static str {
        "blended"
    }

    fn estimate(&self, series: &[MonthlyTotal]) -> Option<f64> {
        match (self.primary.estimate(series), self.secondary.estimate(series)) {
            (Some(p), Some(s)) => Some(stats::round2(self.alpha * p + (1.0 - self.alpha) * s)),
            (Some(p), None) => {
                tracing::debug!(estimator = self.secondary.name(), "blend fell back to primary");
                Some(p)
            }
            (None, Some(s)) => {
                tracing::debug!(estimator = self.primary.name(), "blend fell back to secondary");
                Some(s)
            }
            (None, None) => None,
        }
    }
}

/// Chained total-spending forecast over `history`, empty when the fit is missing or untrusted.
pub fn forecast_total(
    history: &[Expense],
    opts: &RegressionOptions,
    gate: &FitGate,
    horizon: usize,
) -> Vec<ForecastPoint> {
    let series = monthly_totals(history);
    match RegressionFit::fit(&series, opts) {
        Some(fit) if fit.passes(gate) => fit.forecast(horizon),
        Some(fit) => {
            tracing::debug!(
                last = %fit.last,
                r2 = fit.r2,
                correlation = ?fit.correlation,
                "total forecast below gate"
            );
            Vec::new()
        }
        None => {
            tracing::debug!(months = series.len(), "not enough months for total forecast");
            Vec::new()
        }
    }
}

/// Runs the chained forecast per category. Categories without a trusted fit are left out.
///
/// Every category is chained from the last month of the whole history, so a category that
/// stopped appearing still forecasts the same months as the total.
pub fn forecast_by_category(
    history: &[Expense],
    opts: &RegressionOptions,
    gate: &FitGate,
    horizon: usize,
) -> BTreeMap<String, Vec<ForecastPoint>> {
    let Some(start) = history.iter().map(|e| e.period()).max() else {
        return BTreeMap::new();
    };

    let mut by_category: BTreeMap<&str, Vec<&Expense>> = BTreeMap::new();
    for e in history {
        by_category.entry(e.category.as_str()).or_default().push(e);
    }

    let mut out = BTreeMap::new();
    for (category, rows) in by_category {
        let series = monthly_totals(rows);
        if let Some(fit) = RegressionFit::fit(&series, opts).filter(|f| f.passes(gate)) {
            out.insert(category.to_string(), fit.forecast_after(start, horizon));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(points: &[(i32, u32, f64)]) -> Vec<MonthlyTotal> {
        points
            .iter()
            .map(|(y, m, a)| MonthlyTotal {
                period: YearMonth::new(*y, *m),
                amount: *a,
            })
            .collect()
    }

    fn gate() -> FitGate {
        FitGate {
            min_r2: 0.5,
            min_correlation: 0.5,
        }
    }

    #[test]
    fn projects_from_daily_rate() {
        // Days 1..=15 of January, 105 per day.
        let expenses: Vec<Expense> = (1..=15)
            .map(|day| Expense::new(d(2025, 1, day), 105.0, "Food"))
            .collect();
        assert_eq!(project_current_month(&expenses), Some(3255.0));
    }

    #[test]
    fn single_day_projection_exceeds_that_day() {
        let expenses = vec![
            Expense::new(d(2025, 2, 10), 40.0, "Food"),
            Expense::new(d(2025, 2, 10), 10.0, "Fun"),
        ];
        let projected = project_current_month(&expenses).unwrap();
        assert!(projected > 50.0);
        assert_eq!(projected, 50.0 * 28.0);
    }

    #[test]
    fn projection_stops_at_month_end() {
        let expenses = vec![
            Expense::new(d(2025, 4, 1), 10.0, "Food"),
            Expense::new(d(2025, 4, 30), 20.0, "Food"),
        ];
        assert_eq!(project_current_month(&expenses), Some(30.0));
        assert_eq!(project_current_month(&[]), None);
    }

    #[test]
    fn weighted_average_favours_recent_months() {
        let est = WeightedAverage {
            decay: 0.9,
            min_points: 2,
        };
        let s = series(&[(2025, 1, 100.0), (2025, 2, 200.0)]);
        // (100 * 0.9 + 200 * 1) / 1.9
        assert_eq!(est.estimate(&s), Some(152.63));
        assert_eq!(est.estimate(&s[..1]), None);
    }

    #[test]
    fn projection_is_appended_as_latest_point() {
        let s = series(&[(2025, 1, 100.0)]);
        let s = with_projection(s, YearMonth::new(2025, 2), Some(300.0));
        assert_eq!(s.len(), 2);
        assert_eq!(s[1].amount, 300.0);
        let unchanged = with_projection(s.clone(), YearMonth::new(2025, 3), None);
        assert_eq!(unchanged, s);
    }

    #[test]
    fn regression_needs_three_months() {
        let est = RegressionForecast {
            options: RegressionOptions::default(),
            gate: None,
        };
        let s = series(&[(2025, 1, 100.0), (2025, 2, 200.0)]);
        assert_eq!(est.estimate(&s), None);
    }

    #[test]
    fn linear_trend_is_extrapolated() {
        let s = series(&[(2024, 10, 100.0), (2024, 11, 200.0), (2024, 12, 300.0)]);
        let fit = RegressionFit::fit(&s, &RegressionOptions::default()).unwrap();
        assert!((fit.r2 - 1.0).abs() < 1e-9);
        assert!(fit.passes(&gate()));

        let points = fit.forecast(2);
        assert_eq!(points[0].year, 2025);
        assert_eq!(points[0].month, "January");
        assert_eq!(points[0].predicted_spending, 400.0);
        assert_eq!(points[1].month, "February");
        assert_eq!(points[1].predicted_spending, 500.0);
    }

    #[test]
    fn quadratic_fit_follows_curvature() {
        let s = series(&[(2025, 1, 1.0), (2025, 2, 4.0), (2025, 3, 9.0), (2025, 4, 16.0)]);
        let opts = RegressionOptions {
            degree: 2,
            decay: None,
            min_points: 3,
        };
        let fit = RegressionFit::fit(&s, &opts).unwrap();
        assert_eq!(stats::round2(fit.predict(YearMonth::new(2025, 5))), 25.0);
    }

    #[test]
    fn chained_forecast_clamps_every_point() {
        let s = series(&[(2025, 1, 300.0), (2025, 2, 200.0), (2025, 3, 100.0)]);
        let fit = RegressionFit::fit(&s, &RegressionOptions::default()).unwrap();
        let points = fit.forecast(3);
        assert!(points.iter().all(|p| p.predicted_spending >= 0.0));
        assert_eq!(points[2].predicted_spending, 0.0);
    }

    #[test]
    fn flat_history_fails_the_gate() {
        let s = series(&[(2025, 1, 50.0), (2025, 2, 50.0), (2025, 3, 50.0)]);
        let fit = RegressionFit::fit(&s, &RegressionOptions::default()).unwrap();
        assert!(!fit.passes(&gate()));
    }

    #[test]
    fn estimators_ignore_input_order() {
        let s = series(&[(2024, 11, 120.0), (2025, 1, 260.0), (2024, 12, 180.0)]);
        let mut sorted = s.clone();
        sorted.sort_by_key(|m| m.period);
        let est = RegressionForecast {
            options: RegressionOptions::default(),
            gate: None,
        };
        assert_eq!(est.estimate(&s), est.estimate(&sorted));

        let wa = WeightedAverage {
            decay: 0.9,
            min_points: 2,
        };
        assert_eq!(wa.estimate(&s), wa.estimate(&sorted));
        // Newest month weighs 1: (120 * 0.81 + 180 * 0.9 + 260) / 2.71
        assert_eq!(wa.estimate(&s), Some(191.59));

        let blended = Blended {
            alpha: 0.9,
            primary: wa,
            secondary: est,
        };
        assert_eq!(blended.estimate(&s), blended.estimate(&sorted));
    }

    #[test]
    fn blend_falls_back_to_available_side() {
        let blended = Blended {
            alpha: 0.9,
            primary: WeightedAverage {
                decay: 0.9,
                min_points: 2,
            },
            secondary: RegressionForecast {
                options: RegressionOptions::default(),
                gate: Some(gate()),
            },
        };
        let two = series(&[(2025, 1, 100.0), (2025, 2, 200.0)]);
        assert_eq!(blended.estimate(&two), Some(152.63));

        let three = series(&[(2025, 1, 100.0), (2025, 2, 200.0), (2025, 3, 300.0)]);
        let wa = blended.primary.estimate(&three).unwrap();
        let reg = blended.secondary.estimate(&three).unwrap();
        assert_eq!(reg, 400.0);
        assert_eq!(
            blended.estimate(&three),
            Some(stats::round2(0.9 * wa + 0.1 * reg))
        );
        assert_eq!(blended.estimate(&[]), None);
    }

    #[test]
    fn category_forecast_omits_short_or_noisy_histories() {
        let mut history = Vec::new();
        for (m, amount) in [(1, 100.0), (2, 150.0), (3, 200.0)] {
            history.push(Expense::new(d(2025, m, 3), amount, "Rent"));
        }
        history.push(Expense::new(d(2025, 1, 4), 30.0, "Fun"));
        history.push(Expense::new(d(2025, 3, 4), 35.0, "Fun"));

        let out = forecast_by_category(&history, &RegressionOptions::default(), &gate(), 2);
        assert_eq!(out.len(), 1);
        let rent = &out["Rent"];
        assert_eq!(rent.len(), 2);
        assert_eq!(rent[0].month, "April");
        assert_eq!(rent[0].predicted_spending, 250.0);
    }

    #[test]
    fn category_forecast_starts_after_the_whole_history() {
        let mut history = Vec::new();
        for (m, amount) in [(1, 500.0), (2, 600.0), (3, 700.0)] {
            history.push(Expense::new(d(2024, m, 8), amount, "Vacation"));
        }
        for m in 1..=12 {
            history.push(Expense::new(d(2024, m, 2), 100.0 + 10.0 * m as f64, "Food"));
        }

        let out = forecast_by_category(&history, &RegressionOptions::default(), &gate(), 3);
        let vacation = &out["Vacation"];
        assert_eq!((vacation[0].year, vacation[0].month.as_str()), (2025, "January"));
        assert_eq!(
            (vacation[0].year, vacation[0].month.as_str()),
            (out["Food"][0].year, out["Food"][0].month.as_str())
        );
        // The trend line keeps rising from March: index distance 10 months at 100 per month.
        assert_eq!(vacation[0].predicted_spending, 1700.0);
        assert_eq!(vacation[2].month, "March");
    }

    #[test]
    fn total_forecast_is_empty_without_history() {
        let out = forecast_total(&[], &RegressionOptions::default(), &gate(), 12);
        assert!(out.is_empty());
    }
}
