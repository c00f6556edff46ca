//! HTTP handlers grouped by resource.

pub mod admin;
pub mod auth;
pub mod chain_rule;
pub mod field_definition;
