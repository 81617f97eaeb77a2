//! Domain model: mode flags, status tiers with their banding, and the metric
//! catalog (including the built-in airport catalog).

pub mod airport;
pub mod catalog;
pub mod mode;
pub mod status;
