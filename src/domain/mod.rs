//! Domain layer types and invariants.

pub mod criteria;
pub mod dates;
pub mod display;
pub mod entities;
pub mod error;
pub mod types;
