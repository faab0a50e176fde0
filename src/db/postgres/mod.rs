mod client;
mod executor;
mod schema;

pub use client::PostgresClient;
pub use executor::{
    QueryError, QueryExecutor, QueryOutcome, QueryRunner, Record, SqlParam, SqlValue, Statement,
};
pub use schema::{ensure_schema, SCHEMA};

#[cfg(test)]
pub(crate) use executor::mock;
