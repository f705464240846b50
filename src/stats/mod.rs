//! Hub and connection statistics

pub mod metrics;

pub use metrics::{ConnectionStats, HubStats};
