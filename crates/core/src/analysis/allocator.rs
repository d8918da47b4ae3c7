//! Splits the allowed spending across categories by priority.
//!
//! weight(c) = (max_priority + 1) - priority(c), limit(c) = allowed * weight(c) / sum(weights).

use crate::domain::expense::{CategoryLimit, CategoryPriority};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Plain proportional split; the sum may drift by floating-point error.
    #[default]
    None,
    /// Pushes the residual onto the heaviest category so limits sum exactly to the pool.
    CorrectResidual,
}

/// Returns one limit per input category, in input order.
pub fn assign_limits(
    categories: &[CategoryPriority],
    allowed_spending: f64,
    rounding: Rounding,
) -> Result<Vec<CategoryLimit>> {
    let max_priority = categories
        .iter()
        .map(|c| c.priority)
        .max()
        .ok_or_else(|| Error::invalid("cannot assign limits without categories"))?;

    let top = max_priority
        .checked_add(1)
        .ok_or_else(|| Error::invalid(format!("category priority too large: {max_priority}")))?;
    let weights: Vec<f64> = categories
        .iter()
        .map(|c| {
            top.checked_sub(c.priority)
                .map(|w| w as f64)
                .ok_or_else(|| Error::invalid(format!("category priority out of range: {}", c.priority)))
        })
        .collect::<Result<_>>()?;
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return Err(Error::invalid("category weights sum to zero"));
    }

    let mut limits: Vec<CategoryLimit> = categories
        .iter()
        .zip(&weights)
        .map(|(c, w)| CategoryLimit {
            name: c.name.clone(),
            limit: allowed_spending * w / total_weight,
        })
        .collect();

    if rounding == Rounding::CorrectResidual {
        let assigned: f64 = limits.iter().map(|l| l.limit).sum();
        let residual = allowed_spending - assigned;
        // First category among those sharing the maximum weight.
        let heaviest = weights
            .iter()
            .enumerate()
            .fold(0, |best, (i, w)| if *w > weights[best] { i } else { best });
        limits[heaviest].limit += residual;
    }

    Ok(limits)
}
