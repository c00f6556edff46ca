//! Builder for `UPDATE ... SET` statements that only touch changed columns.
//!
//! Pair with [`crm_core::patch::Patch`] DTOs: callers `set` each column that
//! is present in the patch and skip the rest, so absent keys never reach SQL.

use crm_core::types::DbId;
use sqlx::{Encode, Postgres, QueryBuilder, Type};

pub struct UpdateSet<'args> {
    builder: QueryBuilder<'args, Postgres>,
    columns: usize,
}

impl<'args> UpdateSet<'args> {
    pub fn new(table: &str) -> Self {
        Self {
            builder: QueryBuilder::new(format!("UPDATE {table} SET ")),
            columns: 0,
        }
    }

    /// Append `column = $n` with a bound value.
    pub fn set<T>(&mut self, column: &str, value: T) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        if self.columns > 0 {
            self.builder.push(", ");
        }
        self.builder.push(column).push(" = ").push_bind(value);
        self.columns += 1;
        self
    }

    /// Close the statement with `WHERE id = $n RETURNING {returning}`.
    pub fn finish(mut self, id: DbId, returning: &str) -> QueryBuilder<'args, Postgres> {
        self.builder.push(" WHERE id = ").push_bind(id);
        self.builder.push(" RETURNING ").push(returning);
        self.builder
    }
}
