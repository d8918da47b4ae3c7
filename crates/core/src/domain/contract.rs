use crate::domain::expense::{CategoryPriority, Expense};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Body of an analysis request as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Expenses of the month being analysed.
    pub expenses: Vec<Expense>,
    /// Every recorded expense, current month included.
    pub all_expenses: Vec<Expense>,
    pub categories: Vec<CategoryPriority>,
    pub monthly_budget: f64,
    pub goal_amount: f64,
    pub total_spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
    pub past_expenses: Vec<Expense>,
}

/// An analysis request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub expenses: Vec<Expense>,
    pub all_expenses: Vec<Expense>,
    pub categories: Vec<CategoryPriority>,
    pub monthly_budget: f64,
    pub goal_amount: f64,
    pub total_spent: f64,
}

impl ValidatedRequest {
    /// Budget minus goal. Negative when the goal exceeds the budget.
    pub fn allowed_spending(&self) -> f64 {
        self.monthly_budget - self.goal_amount
    }
}

impl AnalysisRequest {
    pub fn validate_and_into_request(self) -> Result<ValidatedRequest> {
        ensure_finite("monthly_budget", self.monthly_budget)?;
        ensure_finite("goal_amount", self.goal_amount)?;
        ensure_finite("total_spent", self.total_spent)?;
        if self.total_spent <= 0.0 {
            return Err(Error::invalid("Total spent should be greater than 0"));
        }
        if self.categories.is_empty() {
            return Err(Error::invalid("categories must not be empty"));
        }

        let mut seen = BTreeSet::new();
        let mut categories = Vec::with_capacity(self.categories.len());
        for c in self.categories {
            let name = c.name.trim().to_string();
            if name.is_empty() {
                return Err(Error::invalid("category name must be non-empty"));
            }
            if c.priority < 1 {
                return Err(Error::invalid(format!(
                    "priority must be a positive integer (category={name}, got {})",
                    c.priority
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::invalid(format!("duplicate category: {name}")));
            }
            categories.push(CategoryPriority {
                name,
                priority: c.priority,
            });
        }

        Ok(ValidatedRequest {
            expenses: validate_expenses("expenses", self.expenses)?,
            all_expenses: validate_expenses("all_expenses", self.all_expenses)?,
            categories,
            monthly_budget: self.monthly_budget,
            goal_amount: self.goal_amount,
            total_spent: self.total_spent,
        })
    }
}

impl LabelRequest {
    pub fn validate_and_into_expenses(self) -> Result<Vec<Expense>> {
        validate_expenses("past_expenses", self.past_expenses)
    }
}

fn validate_expenses(field: &str, expenses: Vec<Expense>) -> Result<Vec<Expense>> {
    let mut out = Vec::with_capacity(expenses.len());
    for (i, e) in expenses.into_iter().enumerate() {
        if !e.amount.is_finite() || e.amount < 0.0 {
            return Err(Error::invalid(format!(
                "{field}[{i}].amount must be a non-negative number (got {})",
                e.amount
            )));
        }
        let category = e.category.trim().to_string();
        if category.is_empty() {
            return Err(Error::invalid(format!("{field}[{i}].category must be non-empty")));
        }
        out.push(Expense {
            date: e.date,
            amount: e.amount,
            category,
        });
    }
    Ok(out)
}

fn ensure_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(format!("{field} must be a finite number")))
    }
}
