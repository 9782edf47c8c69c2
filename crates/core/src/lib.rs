pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod offers;

pub use audit::{AuditAction, AuditLogEntry};
pub use domain::customer::{Customer, CustomerId, Vehicle, VehicleId};
pub use domain::email::EmailLog;
pub use domain::offer::{Offer, OfferId, OfferStatus};
pub use domain::submission::{
    validate_transition, QuoteSubmission, SubmissionId, SubmissionRecord, SubmissionStatus,
};
pub use domain::valuation::{Valuation, ValuationEdit, ValuationId, ValuationStatus};
pub use errors::{ApplicationError, DomainError};
pub use metrics::alerts::{evaluate_alerts, Alert, AlertRule, AlertSeverity, AlertThresholds};
pub use metrics::operations::{compute_operations_metrics, OperationsMetrics};
pub use metrics::sla::{SlaBucket, SlaSummary};
pub use offers::{CascadeOutcome, NewOffer, OfferDefaults, OfferRuleError};
