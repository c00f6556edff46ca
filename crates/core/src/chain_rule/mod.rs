//! Chain rules: a trigger condition on a source field that assigns a value
//! to a target field.
//!
//! Provides the rule vocabulary, mutation-input validation, and a pure-logic
//! evaluator. Read-only propagation lives with the persistence code in
//! `crm-db` because it has to run inside the mutating transaction.

pub mod evaluator;
pub mod rules;
pub mod validation;
