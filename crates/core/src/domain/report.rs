use crate::domain::expense::CategoryLimit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative level assigned by the clustering miners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    High,
    Moderate,
    Low,
}

impl Level {
    /// Labels handed out to `k` clusters ranked by descending centroid.
    pub fn ranked(k: usize) -> &'static [Level] {
        static ALL: [Level; 3] = [Level::High, Level::Moderate, Level::Low];
        &ALL[..k.min(ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    Essential,
    Moderate,
    #[serde(rename = "Non-Essential")]
    NonEssential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    /// English month name, e.g. "March".
    pub month: String,
    pub predicted_spending: f64,
    /// Coefficient of determination of the fit that produced this point.
    pub accuracy: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: Level,
    pub count_of_expenses: usize,
    pub min_expenses: f64,
    pub max_expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingGroup {
    pub category: String,
    pub spending_group: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGroup {
    pub category: String,
    pub frequency_group: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedents: Vec<String>,
    pub consequents: Vec<String>,
    pub support: f64,
    pub confidence: f64,
    pub lift: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryImportance {
    pub category: String,
    pub predicted_importance: Importance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub predicted_current_month: Option<f64>,
    pub predicted_next_month: Option<f64>,
    pub predictions: Vec<ForecastPoint>,
    pub category_predictions: BTreeMap<String, Vec<ForecastPoint>>,
    pub category_limits: Vec<CategoryLimit>,
    pub advice: Vec<String>,
    pub smart_insights: Vec<String>,
    pub expenses_clustering: Vec<ClusterSummary>,
    pub spending_clustering: Vec<SpendingGroup>,
    pub frequency_clustering: Vec<FrequencyGroup>,
    pub association_rules: Vec<AssociationRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelReport {
    pub labeled_categories: Vec<CategoryImportance>,
}
