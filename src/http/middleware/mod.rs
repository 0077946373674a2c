//! HTTP middleware.

pub mod metrics;

pub use metrics::{operation_label, track_requests};
