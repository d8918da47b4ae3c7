//! Category co-occurrence rules mined from a date by category incidence matrix.

use crate::domain::expense::Expense;
use crate::domain::report::AssociationRule;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

type Itemset = BTreeSet<String>;

/// Largest itemset Apriori grows to. Rule splits enumerate `2^len` subsets.
pub const MAX_ITEMSET_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct RuleThresholds {
    pub min_support: f64,
    pub min_confidence: f64,
    pub min_lift: f64,
}

/// Rows are distinct dates; each row holds the categories spent on that date.
pub fn incidence(expenses: &[Expense]) -> Vec<BTreeSet<String>> {
    let mut by_date: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();
    for e in expenses {
        by_date.entry(e.date).or_default().insert(e.category.clone());
    }
    by_date.into_values().collect()
}

/// Level-wise Apriori. Returns every itemset of at most [`MAX_ITEMSET_LEN`] items whose support
/// reaches `min_support`.
pub fn frequent_itemsets(rows: &[BTreeSet<String>], min_support: f64) -> BTreeMap<Itemset, f64> {
    let mut out = BTreeMap::new();
    if rows.is_empty() {
        return out;
    }
    let n = rows.len() as f64;
    let support = |set: &Itemset| rows.iter().filter(|r| set.is_subset(r)).count() as f64 / n;

    let singles: BTreeSet<&String> = rows.iter().flatten().collect();
    let mut level: Vec<Itemset> = Vec::new();
    for item in singles {
        let set: Itemset = [item.clone()].into_iter().collect();
        let s = support(&set);
        if s >= min_support {
            out.insert(set.clone(), s);
            level.push(set);
        }
    }

    while level.len() > 1 && level[0].len() < MAX_ITEMSET_LEN {
        let size = level[0].len() + 1;
        let mut candidates: BTreeSet<Itemset> = BTreeSet::new();
        for (i, a) in level.iter().enumerate() {
            for b in &level[i + 1..] {
                let union: Itemset = a.union(b).cloned().collect();
                if union.len() != size {
                    continue;
                }
                // Every (size - 1)-subset must already be frequent.
                let closed = union.iter().all(|drop| {
                    let mut sub = union.clone();
                    sub.remove(drop);
                    out.contains_key(&sub)
                });
                if closed {
                    candidates.insert(union);
                }
            }
        }

        level = Vec::new();
        for set in candidates {
            let s = support(&set);
            if s >= min_support {
                out.insert(set.clone(), s);
                level.push(set);
            }
        }
    }

    out
}

/// Emits every antecedent and consequent split of each frequent itemset of two or more items.
pub fn mine_rules(expenses: &[Expense], thresholds: &RuleThresholds) -> Vec<AssociationRule> {
    let rows = incidence(expenses);
    let itemsets = frequent_itemsets(&rows, thresholds.min_support);

    let mut multi: Vec<(&Itemset, f64)> = itemsets
        .iter()
        .filter(|(set, _)| set.len() >= 2)
        .map(|(set, s)| (set, *s))
        .collect();
    multi.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut rules = Vec::new();
    for (itemset, support) in multi {
        let items: Vec<&String> = itemset.iter().collect();
        debug_assert!(items.len() <= MAX_ITEMSET_LEN);
        let full = (1u32 << items.len()) - 1;
        for mask in 1..full {
            let antecedent: Itemset = subset(&items, mask);
            let consequent: Itemset = subset(&items, full ^ mask);

            let Some(antecedent_support) = itemsets.get(&antecedent) else {
                continue;
            };
            let confidence = support / antecedent_support;
            let lift = itemsets.get(&consequent).map(|cs| confidence / cs);

            if confidence >= thresholds.min_confidence
                && lift.map_or(true, |l| l >= thresholds.min_lift)
            {
                rules.push(AssociationRule {
                    antecedents: antecedent.into_iter().collect(),
                    consequents: consequent.into_iter().collect(),
                    support,
                    confidence,
                    lift,
                });
            }
        }
    }
    rules
}

fn subset(items: &[&String], mask: u32) -> Itemset {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, s)| (*s).clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(day: u32, category: &str) -> Expense {
        Expense::new(NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), 10.0, category)
    }

    fn set(items: &[&str]) -> Itemset {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn basket() -> Vec<Expense> {
        // Coffee and Snacks always share a day; Fuel is on its own.
        vec![
            e(1, "Coffee"),
            e(1, "Snacks"),
            e(1, "Coffee"),
            e(2, "Coffee"),
            e(2, "Snacks"),
            e(3, "Fuel"),
            e(4, "Coffee"),
            e(4, "Snacks"),
            e(4, "Fuel"),
        ]
    }

    #[test]
    fn incidence_collapses_repeat_purchases() {
        let rows = incidence(&basket());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], set(&["Coffee", "Snacks"]));
    }

    #[test]
    fn apriori_supports() {
        let rows = incidence(&basket());
        let sets = frequent_itemsets(&rows, 0.25);
        assert_eq!(sets[&set(&["Coffee"])], 0.75);
        assert_eq!(sets[&set(&["Fuel"])], 0.5);
        assert_eq!(sets[&set(&["Coffee", "Snacks"])], 0.75);
        assert_eq!(sets[&set(&["Coffee", "Fuel", "Snacks"])], 0.25);

        let strict = frequent_itemsets(&rows, 0.6);
        assert!(!strict.contains_key(&set(&["Fuel"])));
        assert!(strict.contains_key(&set(&["Coffee", "Snacks"])));
    }

    #[test]
    fn rules_carry_confidence_and_lift() {
        let rules = mine_rules(
            &basket(),
            &RuleThresholds {
                min_support: 0.5,
                min_confidence: 0.3,
                min_lift: 1.0,
            },
        );
        let coffee_snacks = rules
            .iter()
            .find(|r| r.antecedents == vec!["Coffee"] && r.consequents == vec!["Snacks"])
            .unwrap();
        assert_eq!(coffee_snacks.support, 0.75);
        assert_eq!(coffee_snacks.confidence, 1.0);
        assert!((coffee_snacks.lift.unwrap() - 4.0 / 3.0).abs() < 1e-12);
        // Coffee/Fuel co-occur on one of four days only.
        assert!(rules.iter().all(|r| !r.antecedents.contains(&"Fuel".to_string())));
    }

    #[test]
    fn splits_cover_multi_item_antecedents() {
        let rules = mine_rules(
            &basket(),
            &RuleThresholds {
                min_support: 0.25,
                min_confidence: 0.0,
                min_lift: 0.0,
            },
        );
        // 3 pairs in 2 directions + 6 splits of the triple.
        assert_eq!(rules.len(), 12);
        assert!(rules
            .iter()
            .any(|r| r.antecedents == vec!["Coffee", "Snacks"] && r.consequents == vec!["Fuel"]));
        for r in &rules {
            let a: Itemset = r.antecedents.iter().cloned().collect();
            let c: Itemset = r.consequents.iter().cloned().collect();
            assert!(a.is_disjoint(&c));
        }
    }

    #[test]
    fn lift_threshold_filters_rules() {
        let rules = mine_rules(
            &basket(),
            &RuleThresholds {
                min_support: 0.25,
                min_confidence: 0.0,
                min_lift: 1.2,
            },
        );
        assert!(rules.iter().all(|r| r.lift.unwrap() >= 1.2));
    }

    #[test]
    fn itemsets_stop_growing_at_the_cap() {
        let names: Vec<String> = (0..10).map(|i| format!("C{i:02}")).collect();
        let mut expenses = Vec::new();
        for day in 1..=3 {
            for name in &names {
                expenses.push(e(day, name));
            }
        }
        let rows = incidence(&expenses);
        let sets = frequent_itemsets(&rows, 0.5);
        let largest = sets.keys().map(|s| s.len()).max().unwrap();
        assert_eq!(largest, MAX_ITEMSET_LEN);

        let rules = mine_rules(
            &expenses,
            &RuleThresholds {
                min_support: 0.5,
                min_confidence: 0.3,
                min_lift: 1.0,
            },
        );
        assert!(rules
            .iter()
            .all(|r| r.antecedents.len() + r.consequents.len() <= MAX_ITEMSET_LEN));
    }

    #[test]
    fn empty_input_mines_nothing() {
        let thresholds = RuleThresholds {
            min_support: 0.1,
            min_confidence: 0.3,
            min_lift: 1.0,
        };
        assert!(mine_rules(&[], &thresholds).is_empty());
    }
}
