//! Spending patterns mined with k-means over standardized scalar features.

use crate::analysis::kmeans::{self, KMeansOptions};
use crate::analysis::stats;
use crate::domain::expense::{counts_by_category, totals_by_category, Expense};
use crate::domain::report::{ClusterSummary, FrequencyGroup, Level, SpendingGroup};
use std::collections::BTreeMap;

/// Outcome of clustering individual transactions by amount.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountClusters {
    /// Most frequent categories in the highest-spending cluster, most frequent first.
    pub top_categories: Vec<String>,
    /// One entry per cluster, High first.
    pub summaries: Vec<ClusterSummary>,
}

impl AmountClusters {
    pub fn insight(&self) -> Option<String> {
        if self.top_categories.is_empty() {
            return None;
        }
        Some(format!(
            "Consider monitoring expenses in '{}', as they have the most expenses that are considered 'High'.",
            self.top_categories.join("', '")
        ))
    }
}

/// Clusters transactions by z-scored amount and inspects the highest cluster.
///
/// `None` when the amounts carry fewer distinct values than clusters.
pub fn cluster_amounts(
    expenses: &[Expense],
    opts: &KMeansOptions,
    top_n: usize,
) -> Option<AmountClusters> {
    let amounts: Vec<f64> = expenses.iter().map(|e| e.amount).collect();
    if stats::distinct_count(&amounts) < opts.k {
        tracing::debug!(
            distinct = stats::distinct_count(&amounts),
            k = opts.k,
            "too few distinct amounts for behavioral clustering"
        );
        return None;
    }

    let normalized = stats::z_scores(&amounts);
    let fit = kmeans::fit(&normalized, opts)?;
    let ranked = fit.ranked_clusters();
    let levels = Level::ranked(ranked.len());

    let mut summaries = Vec::with_capacity(ranked.len());
    for (cluster, level) in ranked.iter().zip(levels) {
        let members: Vec<f64> = amounts
            .iter()
            .zip(&fit.labels)
            .filter(|(_, l)| *l == cluster)
            .map(|(a, _)| *a)
            .collect();
        if members.is_empty() {
            continue;
        }
        summaries.push(ClusterSummary {
            cluster: *level,
            count_of_expenses: members.len(),
            min_expenses: members.iter().copied().fold(f64::INFINITY, f64::min),
            max_expenses: members.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        });
    }

    let highest = ranked[0];
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (e, l) in expenses.iter().zip(&fit.labels) {
        if *l == highest {
            *counts.entry(e.category.as_str()).or_insert(0) += 1;
        }
    }
    let mut by_count: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable sort keeps names alphabetical within equal counts.
    by_count.sort_by(|a, b| b.1.cmp(&a.1));

    Some(AmountClusters {
        top_categories: by_count
            .into_iter()
            .take(top_n)
            .map(|(c, _)| c.to_string())
            .collect(),
        summaries,
    })
}

/// Labels each key High/Moderate/Low by clustering its value.
///
/// A single distinct value labels every key Moderate; otherwise k shrinks to the number of
/// distinct values. Output is ordered High, Moderate, Low and alphabetically within a level.
pub fn label_by_value(values: &BTreeMap<String, f64>, opts: &KMeansOptions) -> Vec<(String, Level)> {
    let keys: Vec<&String> = values.keys().collect();
    let raw: Vec<f64> = values.values().copied().collect();

    let mut labeled: Vec<(String, Level)> = if stats::distinct_count(&raw) <= 1 {
        keys.iter().map(|k| (k.to_string(), Level::Moderate)).collect()
    } else {
        let normalized = stats::z_scores(&raw);
        let k = opts.k.min(stats::distinct_count(&normalized)).max(1);
        let shrunk = KMeansOptions { k, ..*opts };
        match kmeans::fit(&normalized, &shrunk) {
            Some(fit) => {
                let ranked = fit.ranked_clusters();
                let levels = Level::ranked(ranked.len());
                let mut level_of = vec![Level::Moderate; ranked.len()];
                for (cluster, level) in ranked.iter().zip(levels) {
                    level_of[*cluster] = *level;
                }
                keys.iter()
                    .zip(&fit.labels)
                    .map(|(k, l)| (k.to_string(), level_of[*l]))
                    .collect()
            }
            None => keys.iter().map(|k| (k.to_string(), Level::Moderate)).collect(),
        }
    };

    labeled.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    labeled
}

/// Groups categories by their total spending.
pub fn spending_groups(expenses: &[Expense], opts: &KMeansOptions) -> Vec<SpendingGroup> {
    label_by_value(&totals_by_category(expenses), opts)
        .into_iter()
        .map(|(category, spending_group)| SpendingGroup {
            category,
            spending_group,
        })
        .collect()
}

/// Groups categories by how many transactions they have.
pub fn frequency_groups(expenses: &[Expense], opts: &KMeansOptions) -> Vec<FrequencyGroup> {
    let counts: BTreeMap<String, f64> = counts_by_category(expenses)
        .into_iter()
        .map(|(c, n)| (c, n as f64))
        .collect();
    label_by_value(&counts, opts)
        .into_iter()
        .map(|(category, frequency_group)| FrequencyGroup {
            category,
            frequency_group,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn e(day: u32, amount: f64, category: &str) -> Expense {
        Expense::new(NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), amount, category)
    }

    #[test]
    fn highest_cluster_names_its_categories() {
        let expenses = vec![
            e(1, 5.0, "Coffee"),
            e(2, 6.0, "Coffee"),
            e(3, 5.5, "Snacks"),
            e(4, 50.0, "Food"),
            e(5, 55.0, "Food"),
            e(6, 900.0, "Rent"),
            e(7, 950.0, "Travel"),
            e(8, 920.0, "Rent"),
        ];
        let out = cluster_amounts(&expenses, &KMeansOptions::default(), 4).unwrap();
        assert_eq!(out.top_categories, vec!["Rent".to_string(), "Travel".to_string()]);
        assert_eq!(out.summaries.len(), 3);
        assert_eq!(out.summaries[0].cluster, Level::High);
        assert_eq!(out.summaries[0].count_of_expenses, 3);
        assert_eq!(out.summaries[0].min_expenses, 900.0);
        assert_eq!(out.summaries[0].max_expenses, 950.0);
        assert_eq!(out.summaries[2].cluster, Level::Low);
        assert_eq!(out.summaries[2].max_expenses, 6.0);

        let insight = out.insight().unwrap();
        assert!(insight.contains("'Rent', 'Travel'"));
    }

    #[test]
    fn amount_clustering_skips_low_cardinality() {
        let expenses = vec![e(1, 5.0, "A"), e(2, 5.0, "B"), e(3, 9.0, "C"), e(4, 9.0, "A")];
        assert!(cluster_amounts(&expenses, &KMeansOptions::default(), 4).is_none());
    }

    #[test]
    fn top_categories_are_capped() {
        let mut expenses = vec![e(1, 1.0, "Low"), e(2, 2.0, "Low2")];
        for (i, c) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            expenses.push(e(10 + i as u32, 1000.0 + i as f64, c));
        }
        let out = cluster_amounts(&expenses, &KMeansOptions::default(), 4).unwrap();
        assert!(out.top_categories.len() <= 4);
    }

    #[test]
    fn identical_totals_are_all_moderate() {
        let expenses = vec![e(1, 10.0, "A"), e(2, 10.0, "B"), e(3, 10.0, "C")];
        let groups = spending_groups(&expenses, &KMeansOptions::default());
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.spending_group == Level::Moderate));

        let freq = frequency_groups(&expenses, &KMeansOptions::default());
        assert!(freq.iter().all(|g| g.frequency_group == Level::Moderate));
    }

    #[test]
    fn two_distinct_totals_use_high_and_moderate() {
        let expenses = vec![e(1, 10.0, "A"), e(2, 10.0, "B"), e(3, 90.0, "C")];
        let groups = spending_groups(&expenses, &KMeansOptions::default());
        assert_eq!(groups[0].category, "C");
        assert_eq!(groups[0].spending_group, Level::High);
        assert_eq!(groups[1].spending_group, Level::Moderate);
        assert_eq!(groups[2].spending_group, Level::Moderate);
    }

    #[test]
    fn every_category_is_labeled_once_in_level_order() {
        let expenses = vec![
            e(1, 500.0, "Rent"),
            e(2, 40.0, "Food"),
            e(3, 45.0, "Food"),
            e(4, 12.0, "Coffee"),
            e(5, 3.0, "Gum"),
            e(6, 220.0, "Travel"),
            e(7, 60.0, "Fuel"),
        ];
        let groups = spending_groups(&expenses, &KMeansOptions::default());
        let names: BTreeSet<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(groups.len(), 6);
        assert_eq!(names.len(), 6);
        assert_eq!(groups[0].category, "Rent");
        assert!(groups.windows(2).all(|w| w[0].spending_group <= w[1].spending_group));
    }

    #[test]
    fn frequency_groups_rank_by_count() {
        let mut expenses = Vec::new();
        for day in 1..=9 {
            expenses.push(e(day, 4.0, "Coffee"));
        }
        for day in 1..=4 {
            expenses.push(e(day, 30.0, "Food"));
        }
        expenses.push(e(5, 800.0, "Rent"));
        let freq = frequency_groups(&expenses, &KMeansOptions::default());
        assert_eq!(freq[0].category, "Coffee");
        assert_eq!(freq[0].frequency_group, Level::High);
        assert_eq!(freq[2].category, "Rent");
        assert_eq!(freq[2].frequency_group, Level::Low);
    }
}
