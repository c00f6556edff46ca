//! Shared response envelope types for API handlers.
//!
//! Reads answer with `{ "data": ... }`. Mutations on chain rules answer with
//! a human-readable `message`, plus the new `id` on create.

use crm_core::types::DbId;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: DbId,
    pub message: String,
}
