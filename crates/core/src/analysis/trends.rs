//! Read-only trend checks over an expense table: variability, deviation from the usual
//! spending pace, and weekday peaks. Each returns `None` when its input is too thin.

use crate::analysis::stats;
use crate::domain::expense::{amounts_by_category, totals_by_category, Expense};
use crate::time::calendar::{weekday_name, YearMonth, WEEKDAYS};
use chrono::Datelike;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Variability {
    pub category: String,
    pub std_dev: f64,
}

impl Variability {
    pub fn insight(&self) -> String {
        format!(
            "Spending in '{}' varies the most. Keep an eye on it!",
            self.category
        )
    }
}

/// Category with the largest sample standard deviation among those with two or more records.
pub fn most_variable_category(expenses: &[Expense]) -> Option<Variability> {
    let qualifying: Vec<(String, f64)> = amounts_by_category(expenses)
        .into_iter()
        .filter_map(|(c, amounts)| stats::sample_std(&amounts).map(|s| (c, s)))
        .collect();
    if qualifying.len() < 2 {
        return None;
    }
    qualifying
        .into_iter()
        .fold(None::<(String, f64)>, |best, (c, s)| match best {
            Some((_, bs)) if bs >= s => best,
            _ => Some((c, s)),
        })
        .map(|(category, std_dev)| Variability { category, std_dev })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deviations {
    /// Current minus baseline per category, largest first.
    pub ranked: Vec<(String, f64)>,
}

impl Deviations {
    pub fn largest_increase(&self) -> Option<&str> {
        self.ranked
            .first()
            .filter(|(_, d)| *d > 0.0)
            .map(|(c, _)| c.as_str())
    }

    pub fn largest_decrease(&self) -> Option<&str> {
        self.ranked
            .last()
            .filter(|(_, d)| *d < 0.0)
            .map(|(c, _)| c.as_str())
    }

    pub fn insight(&self) -> Option<String> {
        match (self.largest_increase(), self.largest_decrease()) {
            (Some(up), Some(down)) => Some(format!(
                "Spending on '{up}' increased the most, while spending on '{down}' decreased the most compared to your usual spending."
            )),
            (Some(up), None) => Some(format!(
                "Spending on '{up}' increased the most compared to your usual spending."
            )),
            (None, Some(down)) => Some(format!(
                "Spending on '{down}' decreased the most compared to your usual spending."
            )),
            (None, None) => None,
        }
    }
}

/// Compares the current month's per-category totals with what the category usually reached by
/// the same day of the month.
///
/// The baseline of a category is the mean, over historical months where it appears, of its
/// cumulative spending up to the latest day recorded in `current`. Categories with no history
/// have a baseline of zero.
pub fn spending_deviations(current: &[Expense], history: &[Expense]) -> Option<Deviations> {
    let days_so_far = current.iter().map(|e| e.day()).max()?;

    let mut cumulative: BTreeMap<(&str, YearMonth), f64> = BTreeMap::new();
    for e in history {
        let slot = cumulative.entry((e.category.as_str(), e.period())).or_insert(0.0);
        if e.day() <= days_so_far {
            *slot += e.amount;
        }
    }
    let mut per_category: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for ((category, _), amount) in cumulative {
        per_category.entry(category).or_default().push(amount);
    }

    let mut ranked: Vec<(String, f64)> = totals_by_category(current)
        .into_iter()
        .map(|(category, total)| {
            let baseline = per_category
                .get(category.as_str())
                .and_then(|v| stats::mean(v))
                .unwrap_or(0.0);
            (category, total - baseline)
        })
        .collect();
    if ranked.is_empty() {
        return None;
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Some(Deviations { ranked })
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayPeaks {
    /// Weekday with the most transactions.
    pub peak_count_day: &'static str,
    /// Weekday with the highest mean amount.
    pub peak_spending_day: &'static str,
    /// Transaction counts, Sunday first.
    pub counts: [usize; 7],
}

impl WeekdayPeaks {
    pub fn insight(&self) -> String {
        format!(
            "You have the highest number of expenses on {}s, and the highest spending on {}s. Plan ahead!",
            self.peak_count_day, self.peak_spending_day
        )
    }
}

/// Needs transactions on at least two different weekdays. Ties go to the earlier weekday.
pub fn weekday_peaks(expenses: &[Expense]) -> Option<WeekdayPeaks> {
    let mut counts = [0usize; 7];
    let mut sums = [0.0f64; 7];
    for e in expenses {
        let idx = e.date.weekday().num_days_from_sunday() as usize;
        counts[idx] += 1;
        sums[idx] += e.amount;
    }
    if counts.iter().filter(|c| **c > 0).count() < 2 {
        return None;
    }

    let mut peak_count = 0;
    let mut peak_mean: Option<(usize, f64)> = None;
    for i in 0..7 {
        if counts[i] > counts[peak_count] {
            peak_count = i;
        }
        if counts[i] > 0 {
            let m = sums[i] / counts[i] as f64;
            if peak_mean.map_or(true, |(_, best)| m > best) {
                peak_mean = Some((i, m));
            }
        }
    }
    let (peak_spending, _) = peak_mean?;

    Some(WeekdayPeaks {
        peak_count_day: weekday_name(WEEKDAYS[peak_count]),
        peak_spending_day: weekday_name(WEEKDAYS[peak_spending]),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn e(y: i32, m: u32, d: u32, amount: f64, category: &str) -> Expense {
        Expense::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), amount, category)
    }

    #[test]
    fn finds_most_variable_category() {
        let expenses = vec![
            e(2025, 1, 1, 10.0, "Food"),
            e(2025, 1, 2, 12.0, "Food"),
            e(2025, 1, 3, 10.0, "Fun"),
            e(2025, 1, 4, 200.0, "Fun"),
            e(2025, 1, 5, 999.0, "Rent"),
        ];
        let v = most_variable_category(&expenses).unwrap();
        assert_eq!(v.category, "Fun");
        assert!(v.insight().contains("'Fun' varies the most"));
    }

    #[test]
    fn variability_needs_two_qualifying_categories() {
        let expenses = vec![
            e(2025, 1, 1, 10.0, "Food"),
            e(2025, 1, 2, 12.0, "Food"),
            e(2025, 1, 5, 999.0, "Rent"),
        ];
        assert_eq!(most_variable_category(&expenses), None);
        assert_eq!(most_variable_category(&[]), None);
    }

    #[test]
    fn deviations_compare_against_same_day_pace() {
        let history = vec![
            // December: Food 100 by day 10, 300 more after.
            e(2024, 12, 3, 100.0, "Food"),
            e(2024, 12, 25, 300.0, "Food"),
            e(2024, 12, 5, 80.0, "Fun"),
            // November: Food 60 by day 10.
            e(2024, 11, 9, 60.0, "Food"),
            e(2024, 11, 8, 40.0, "Fun"),
        ];
        let current = vec![
            e(2025, 1, 2, 150.0, "Food"),
            e(2025, 1, 10, 10.0, "Fun"),
            e(2025, 1, 7, 5.0, "Gifts"),
        ];
        let dev = spending_deviations(&current, &history).unwrap();
        // Food: 150 - mean(100, 60) = 70; Fun: 10 - mean(80, 40) = -50; Gifts: 5 - 0.
        assert_eq!(dev.ranked[0], ("Food".to_string(), 70.0));
        assert_eq!(dev.ranked[1], ("Gifts".to_string(), 5.0));
        assert_eq!(dev.ranked[2], ("Fun".to_string(), -50.0));
        assert_eq!(
            dev.insight().unwrap(),
            "Spending on 'Food' increased the most, while spending on 'Fun' decreased the most compared to your usual spending."
        );
    }

    #[test]
    fn deviation_reports_one_side_when_other_is_missing() {
        let history = vec![e(2024, 12, 1, 10.0, "Food")];
        let current = vec![e(2025, 1, 1, 50.0, "Food"), e(2025, 1, 1, 5.0, "Fun")];
        let dev = spending_deviations(&current, &history).unwrap();
        assert_eq!(dev.largest_decrease(), None);
        assert_eq!(
            dev.insight().unwrap(),
            "Spending on 'Food' increased the most compared to your usual spending."
        );
        assert!(spending_deviations(&[], &history).is_none());
    }

    #[test]
    fn weekday_peaks_count_and_mean_separately() {
        // 2025-01-04 and 2025-01-11 and 2025-01-18 are Saturdays; 2025-01-05/12 Sundays.
        let expenses = vec![
            e(2025, 1, 4, 10.0, "A"),
            e(2025, 1, 11, 10.0, "A"),
            e(2025, 1, 18, 10.0, "A"),
            e(2025, 1, 5, 100.0, "B"),
            e(2025, 1, 12, 80.0, "B"),
        ];
        let peaks = weekday_peaks(&expenses).unwrap();
        assert_eq!(peaks.peak_count_day, "Saturday");
        assert_eq!(peaks.peak_spending_day, "Sunday");
        assert_eq!(peaks.counts[6], 3);
        assert_eq!(peaks.counts[0], 2);
        assert!(peaks.insight().starts_with("You have the highest number of expenses on Saturdays"));
    }

    #[test]
    fn weekday_peaks_need_two_weekdays() {
        let expenses = vec![e(2025, 1, 4, 10.0, "A"), e(2025, 1, 11, 20.0, "A")];
        assert_eq!(weekday_peaks(&expenses), None);
        assert_eq!(weekday_peaks(&[]), None);
    }
}
