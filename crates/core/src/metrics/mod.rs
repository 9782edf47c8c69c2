//! Read-only operational reporting over submission records.
//!
//! Every figure is recomputed from the records handed in; nothing is cached.

pub mod alerts;
pub mod operations;
pub mod sla;

pub use alerts::{evaluate_alerts, Alert, AlertRule, AlertSeverity, AlertThresholds};
pub use operations::{
    compute_operations_metrics, validate_window, AcceptanceMetrics, DiscountMetrics,
    OperationsMetrics, DEFAULT_WINDOW_DAYS,
};
pub use sla::{SlaAccumulator, SlaBucket, SlaSummary};
