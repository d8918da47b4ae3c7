//! Rule-based category importance from monthly aggregates.

use crate::analysis::stats;
use crate::domain::expense::Expense;
use crate::domain::report::{CategoryImportance, Importance};
use crate::time::calendar::YearMonth;
use std::collections::BTreeMap;

/// Per-category averages across the months the category appears in.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub category: String,
    /// Mean monthly total.
    pub total_spent: f64,
    /// Mean monthly transaction count.
    pub frequency: f64,
    /// Mean of the monthly standard deviations; NaN when no month has two records.
    pub consistency: f64,
}

pub fn category_stats(expenses: &[Expense]) -> Vec<CategoryStats> {
    let mut monthly: BTreeMap<(&str, YearMonth), Vec<f64>> = BTreeMap::new();
    for e in expenses {
        monthly
            .entry((e.category.as_str(), e.period()))
            .or_default()
            .push(e.amount);
    }

    let mut per_category: BTreeMap<&str, (Vec<f64>, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for ((category, _), amounts) in monthly {
        let (totals, counts, stds) = per_category.entry(category).or_default();
        totals.push(amounts.iter().sum());
        counts.push(amounts.len() as f64);
        if let Some(s) = stats::sample_std(&amounts) {
            stds.push(s);
        }
    }

    per_category
        .into_iter()
        .map(|(category, (totals, counts, stds))| CategoryStats {
            category: category.to_string(),
            total_spent: stats::mean(&totals).unwrap_or(0.0),
            frequency: stats::mean(&counts).unwrap_or(0.0),
            consistency: stats::mean(&stds).unwrap_or(f64::NAN),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Cutoffs {
    total_q25: f64,
    total_q75: f64,
    total_q90: f64,
    freq_q25: f64,
    freq_q75: f64,
    consistency_q25: f64,
}

impl Cutoffs {
    fn from_stats(rows: &[CategoryStats]) -> Option<Self> {
        let totals: Vec<f64> = rows.iter().map(|r| r.total_spent).collect();
        let freqs: Vec<f64> = rows.iter().map(|r| r.frequency).collect();
        let consistency: Vec<f64> = rows.iter().map(|r| r.consistency).collect();
        Some(Self {
            total_q25: stats::quantile(&totals, 0.25)?,
            total_q75: stats::quantile(&totals, 0.75)?,
            total_q90: stats::quantile(&totals, 0.90)?,
            freq_q25: stats::quantile(&freqs, 0.25)?,
            freq_q75: stats::quantile(&freqs, 0.75)?,
            // NaN compares false, so rule 4 never fires without a defined quantile.
            consistency_q25: stats::quantile(&consistency, 0.25).unwrap_or(f64::NAN),
        })
    }
}

/// Evaluated top to bottom; the first matching rule decides.
fn classify(row: &CategoryStats, q: &Cutoffs) -> Importance {
    let in_band = |x: f64, lo: f64, hi: f64| x >= lo && x <= hi;

    if row.total_spent > q.total_q75 {
        Importance::Essential
    } else if row.frequency > q.freq_q75 {
        Importance::Essential
    } else if in_band(row.total_spent, q.total_q25, q.total_q75)
        && in_band(row.frequency, q.freq_q25, q.freq_q75)
    {
        Importance::Moderate
    } else if row.consistency < q.consistency_q25 {
        Importance::NonEssential
    } else if row.total_spent > q.total_q90 && row.frequency <= q.freq_q25 {
        // Rare but expensive, e.g. annual insurance.
        Importance::Essential
    } else {
        Importance::NonEssential
    }
}

/// Labels every category found in `expenses`, Essential first, then by name.
pub fn label_categories(expenses: &[Expense]) -> Vec<CategoryImportance> {
    let rows = category_stats(expenses);
    let Some(cutoffs) = Cutoffs::from_stats(&rows) else {
        return Vec::new();
    };

    let mut out: Vec<CategoryImportance> = rows
        .iter()
        .map(|row| CategoryImportance {
            category: row.category.clone(),
            predicted_importance: classify(row, &cutoffs),
        })
        .collect();
    out.sort_by(|a, b| {
        a.predicted_importance
            .cmp(&b.predicted_importance)
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}
