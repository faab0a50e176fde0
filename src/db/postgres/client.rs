use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{debug, info};
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::types::Type;
use tokio_postgres::{NoTls, Row};

use super::executor::{QueryError, QueryExecutor, QueryOutcome, Record, SqlValue, Statement};
use crate::config::{ConnectionTarget, PostgresSettings};

/// PostgreSQL client with connection pooling.
///
/// Owns the single `deadpool-postgres` pool shared by every price store.
/// Created once at startup and closed at shutdown.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL");

        let max_retries = settings.connect_retries.max(1);
        let mut retries = 0;
        #[allow(unused_assignments)]
        let mut last_error: Option<anyhow::Error> = None;

        loop {
            let pool = build_pool(&settings)?;

            // Test the connection
            match pool.get().await {
                Ok(_conn) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(Self {
                        pool,
                    });
                },
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("{}", e));
                    retries += 1;

                    if retries >= max_retries {
                        break;
                    }

                    let delay = retry_delay(retries);
                    log::warn!(
                        "Failed to connect to PostgreSQL (attempt {}/{}), retrying in {:?}...",
                        retries,
                        max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }

        Err(anyhow::anyhow!(
            "Failed to connect to PostgreSQL after {} attempts: {}",
            max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        ))
    }

    /// Health check - verify connection is still alive
    pub async fn health_check(&self) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .context("PostgreSQL health check failed")?;
        Ok(())
    }

    pub fn close(&self) {
        self.pool.close();
        info!("PostgreSQL pool closed");
    }
}

/// Longest wait between connection attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff from 200ms, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(attempt: u32) -> Duration {
    let millis = 2_u64.saturating_pow(attempt).saturating_mul(100);
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

fn build_pool(settings: &PostgresSettings) -> anyhow::Result<Pool> {
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match settings.target().context("Invalid PostgreSQL settings")? {
        ConnectionTarget::Discrete {
            host,
            port,
            user,
            password,
            database,
        } => {
            let mut pg_config = tokio_postgres::Config::new();
            pg_config.host(host).port(port).user(user).dbname(database);
            if let Some(password) = password {
                pg_config.password(password);
            }
            Manager::from_config(pg_config, NoTls, mgr_config)
        },
        ConnectionTarget::Url(url) => {
            let pg_config: tokio_postgres::Config =
                url.parse().context("Failed to parse PostgreSQL connection string")?;
            // Hosted databases present certificates we do not verify
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .context("Failed to build TLS connector")?;
            Manager::from_config(pg_config, MakeTlsConnector::new(connector), mgr_config)
        },
    };

    Pool::builder(mgr)
        .max_size(settings.pool_size)
        .build()
        .context("Failed to create PostgreSQL connection pool")
}

#[async_trait]
impl QueryExecutor for PostgresClient {
    async fn run(&self, statement: &Statement) -> QueryOutcome {
        let client = self.pool.get().await?;
        let params: Vec<_> = statement.params.iter().map(|p| p.as_sql()).collect();

        let rows = client.query(statement.sql.as_str(), &params).await?;
        debug!("Statement returned {} rows", rows.len());

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &Row) -> Result<Record, QueryError> {
    let mut record = Record::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::BigInt)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::BigInt(v.into()))
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::BigInt(v.into()))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Double)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)?.map(|v| SqlValue::Double(v.into()))
        } else if [Type::VARCHAR, Type::TEXT, Type::BPCHAR, Type::NAME].contains(ty) {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        } else {
            return Err(QueryError::UnsupportedType {
                column: column.name().to_string(),
                ty: ty.clone(),
            });
        };

        record.insert(column.name(), value.unwrap_or(SqlValue::Null));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_delay(1), Duration::from_millis(200));
        assert_eq!(retry_delay(2), Duration::from_millis(400));
        assert_eq!(retry_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_delay_is_capped_for_many_attempts() {
        assert_eq!(retry_delay(20), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(64), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u32::MAX), MAX_RETRY_DELAY);
    }
}
