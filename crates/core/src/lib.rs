//! `brigade-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! aggregate traits, the domain error taxonomy, identifiers, money helpers and
//! the sequence-number service used for human-facing numbering.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod sequence;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use money::{MONEY_TOLERANCE, Money};
pub use sequence::{InMemorySequence, SequenceGenerator};
