//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only. Storage and transport concerns have
/// their own error types in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A state machine transition is not permitted from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// One or more products have no station able to prepare them.
    #[error("unroutable items: no station resolves for product(s) {0}")]
    UnroutableItem(String),

    /// A referenced order, item, payment, product, table or station does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A payment would exceed the remaining balance.
    #[error("overpayment: amount {amount} exceeds remaining balance {remaining}")]
    Overpayment { amount: Decimal, remaining: Decimal },

    /// Split amounts do not add up to the payment amount.
    #[error("split mismatch: splits total {split_total}, payment amount is {amount}")]
    SplitMismatch { amount: Decimal, split_total: Decimal },

    /// Stale version / optimistic concurrency failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A value failed validation (malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation needs a supervising approver that was not supplied.
    #[error("supervisor approval required: {0}")]
    SupervisorApprovalRequired(String),

    /// A domain invariant would be violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn unroutable(products: impl Into<String>) -> Self {
        Self::UnroutableItem(products.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn supervisor_required(msg: impl Into<String>) -> Self {
        Self::SupervisorApprovalRequired(msg.into())
    }
}
