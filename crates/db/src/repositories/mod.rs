//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod chain_rule_repo;
pub mod field_definition_repo;
pub mod session_repo;
pub mod user_repo;

pub use chain_rule_repo::ChainRuleRepo;
pub use field_definition_repo::FieldDefinitionRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
