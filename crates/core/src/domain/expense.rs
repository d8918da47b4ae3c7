use crate::time::calendar::YearMonth;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
}

impl Expense {
    pub fn new(date: NaiveDate, amount: f64, category: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            category: category.into(),
        }
    }

    pub fn period(&self) -> YearMonth {
        YearMonth::of(self.date)
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPriority {
    pub name: String,
    /// 1 is the most essential.
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLimit {
    pub name: String,
    pub limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub period: YearMonth,
    pub amount: f64,
}

/// Sums expenses per calendar month, oldest first.
pub fn monthly_totals<'a, I>(expenses: I) -> Vec<MonthlyTotal>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut by_month: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for e in expenses {
        *by_month.entry(e.period()).or_insert(0.0) += e.amount;
    }
    by_month
        .into_iter()
        .map(|(period, amount)| MonthlyTotal { period, amount })
        .collect()
}

pub fn totals_by_category(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for e in expenses {
        *out.entry(e.category.clone()).or_insert(0.0) += e.amount;
    }
    out
}

pub fn counts_by_category(expenses: &[Expense]) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    for e in expenses {
        *out.entry(e.category.clone()).or_insert(0) += 1;
    }
    out
}

pub fn amounts_by_category(expenses: &[Expense]) -> BTreeMap<String, Vec<f64>> {
    let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for e in expenses {
        out.entry(e.category.clone()).or_default().push(e.amount);
    }
    out
}

pub fn distinct_categories(expenses: &[Expense]) -> BTreeSet<&str> {
    expenses.iter().map(|e| e.category.as_str()).collect()
}

/// Month of the latest expense, if any.
pub fn latest_period(expenses: &[Expense]) -> Option<YearMonth> {
    expenses.iter().map(|e| e.date).max().map(YearMonth::of)
}

/// Records of `all` that fall outside `period`.
pub fn excluding_period(all: &[Expense], period: Option<YearMonth>) -> Vec<Expense> {
    match period {
        Some(p) => all.iter().filter(|e| e.period() != p).cloned().collect(),
        None => all.to_vec(),
    }
}

/// Accepts `YYYY-MM-DD` or any timestamp whose first ten characters are a date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}
