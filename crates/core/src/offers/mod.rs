//! Offer lifecycle rules.
//!
//! Everything here is pure: callers load the offer, apply a rule, and persist
//! the result. Parent submission updates driven by an offer change are
//! reported through [`CascadeOutcome`] so partial failures stay visible.

pub mod lifecycle;
pub mod token;

pub use lifecycle::{parent_status_for, CascadeOutcome, NewOffer, OfferDefaults, OfferRuleError};
pub use token::generate_tracking_token;
