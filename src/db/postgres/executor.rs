use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::error;
use thiserror::Error;
use tokio_postgres::types::{ToSql, Type};

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    BigInt(i64),
    Double(f64),
    Text(String),
    NullDouble,
    NullText,
}

impl SqlParam {
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::BigInt(v) => v,
            SqlParam::Double(v) => v,
            SqlParam::Text(v) => v,
            SqlParam::NullDouble => &None::<f64>,
            SqlParam::NullText => &None::<&str>,
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::BigInt(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Double(v)
    }
}

impl From<Option<f64>> for SqlParam {
    fn from(v: Option<f64>) -> Self {
        v.map_or(SqlParam::NullDouble, SqlParam::Double)
    }
}

impl From<Option<&str>> for SqlParam {
    fn from(v: Option<&str>) -> Self {
        v.map_or(SqlParam::NullText, |v| SqlParam::Text(v.to_string()))
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

/// Parameterized SQL statement, positional `$n` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// A single column value as decoded from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    BigInt(i64),
    Double(f64),
    Text(String),
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, SqlValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: SqlValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: SqlValue) {
        self.values.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.values.get(column)? {
            SqlValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.values.get(column)? {
            SqlValue::Double(v) => Some(*v),
            SqlValue::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        match self.values.get(column)? {
            SqlValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// `Some(None)` for a NULL column, `None` when the column is missing
    /// or holds another type.
    pub fn get_nullable_f64(&self, column: &str) -> Option<Option<f64>> {
        match self.values.get(column)? {
            SqlValue::Null => Some(None),
            _ => self.get_f64(column).map(Some),
        }
    }

    pub fn get_nullable_str(&self, column: &str) -> Option<Option<&str>> {
        match self.values.get(column)? {
            SqlValue::Null => Some(None),
            _ => self.get_str(column).map(Some),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to acquire connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("statement failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("unsupported type {ty} for column {column}")]
    UnsupportedType { column: String, ty: Type },
}

pub type QueryOutcome = Result<Vec<Record>, QueryError>;

/// Runs one statement and reports the outcome without hiding failures.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, statement: &Statement) -> QueryOutcome;
}

/// Soft-failing front of a [`QueryExecutor`].
///
/// Failed statements are logged, counted and turned into an empty row set,
/// so callers never see an error. Reads that fail look like "no data" and
/// writes that fail leave no row; `failed_statements` is the only signal.
pub struct QueryRunner {
    executor: Arc<dyn QueryExecutor>,
    failures: AtomicU64,
}

impl QueryRunner {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            failures: AtomicU64::new(0),
        }
    }

    pub async fn execute(&self, statement: &Statement) -> Vec<Record> {
        self.execute_checked(statement).await.unwrap_or_default()
    }

    /// Like [`execute`](Self::execute) but keeps failure visible as `None`.
    pub async fn execute_checked(&self, statement: &Statement) -> Option<Vec<Record>> {
        match self.executor.run(statement).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    "Statement failed (failed_statements={}): {:#} [sql: {}]",
                    total,
                    e,
                    statement.sql.trim()
                );
                None
            },
        }
    }

    /// Total statements that failed since startup.
    pub fn failed_statements(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&Statement) -> QueryOutcome + Send + Sync>;

    /// Records every statement and answers with a scripted responder.
    pub struct MockExecutor {
        statements: Mutex<Vec<Statement>>,
        responder: Responder,
    }

    impl MockExecutor {
        pub fn new<F>(responder: F) -> Arc<Self>
        where
            F: Fn(&Statement) -> QueryOutcome + Send + Sync + 'static,
        {
            Arc::new(Self {
                statements: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            })
        }

        pub fn empty() -> Arc<Self> {
            Self::new(|_| Ok(Vec::new()))
        }

        pub fn statements(&self) -> Vec<Statement> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for MockExecutor {
        async fn run(&self, statement: &Statement) -> QueryOutcome {
            self.statements.lock().unwrap().push(statement.clone());
            (self.responder)(statement)
        }
    }

    pub fn runner(executor: &Arc<MockExecutor>) -> Arc<QueryRunner> {
        Arc::new(QueryRunner::new(executor.clone()))
    }

    pub fn failure() -> QueryError {
        QueryError::UnsupportedType {
            column: "mock".to_string(),
            ty: Type::BOOL,
        }
    }
}
