//! Generation backend abstraction: provider trait, type-erased wrapper,
//! and the context token budget.

pub mod box_provider;
pub mod provider;
pub mod token_budget;
