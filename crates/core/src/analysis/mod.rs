pub mod allocator;
pub mod association;
pub mod clustering;
pub mod forecast;
pub mod importance;
pub mod kmeans;
pub mod stats;
pub mod trends;
