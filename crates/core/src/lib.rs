//! Personal-finance analytics: budget allocation, spending forecasts, pattern mining and
//! rule-based advice over a user's expenses.
//!
//! Every analysis is a pure function over the request's own data; nothing is kept between runs.

pub mod analysis;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod time;

pub use error::{Error, Result};
