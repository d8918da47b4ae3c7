pub mod contract;
pub mod expense;
pub mod report;
