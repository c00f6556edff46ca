//! Domain types and pure logic for the CRM field subsystem.
//!
//! Nothing in this crate touches the database; the `crm-db` crate persists
//! what is defined here and the `crm-api` crate exposes it over HTTP.

pub mod chain_rule;
pub mod error;
pub mod field;
pub mod patch;
pub mod roles;
pub mod types;
