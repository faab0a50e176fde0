use std::sync::Arc;

use log::info;

use crate::config::PostgresSettings;

pub mod models;
pub mod postgres;
pub mod stores;

pub use models::{NewTokenPrice, TimedTokenPrice, TokenPrice};
pub use postgres::{PostgresClient, QueryExecutor, QueryRunner};
pub use stores::{TimedPriceStore, TokenPriceStore};

/// Root database component.
///
/// Holds the one PostgreSQL pool for the process and hands the shared
/// [`QueryRunner`] to both price stores. None of the price operations
/// return errors: failures are logged and counted by the runner.
#[derive(Clone)]
pub struct Database {
    pub postgres: Option<Arc<PostgresClient>>,
    pub runner: Arc<QueryRunner>,
    pub token_prices: TokenPriceStore,
    pub timed_prices: TimedPriceStore,
}

impl Database {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        let postgres = Arc::new(PostgresClient::new(settings).await?);
        let mut db = Self::with_executor(postgres.clone());
        db.postgres = Some(postgres);

        info!("Price database ready");
        Ok(db)
    }

    /// Builds the stores over any executor, without owning a pool.
    pub fn with_executor(executor: Arc<dyn QueryExecutor>) -> Self {
        let runner = Arc::new(QueryRunner::new(executor));
        Self {
            postgres: None,
            token_prices: TokenPriceStore::new(runner.clone()),
            timed_prices: TimedPriceStore::new(runner.clone()),
            runner,
        }
    }

    /// Raw price history; `None` or an empty address yields no rows.
    pub async fn get_token_prices(
        &self,
        token_address: Option<&str>,
        from_time: Option<i64>,
        to_time: Option<i64>,
        unlimited: bool,
    ) -> Vec<TokenPrice> {
        match token_address {
            Some(token_address) => {
                self.token_prices
                    .query(token_address, from_time, to_time, unlimited)
                    .await
            },
            None => Vec::new(),
        }
    }

    pub async fn insert_token_prices(&self, prices: &[NewTokenPrice]) {
        self.token_prices.insert(prices).await
    }

    pub async fn get_latest_token_price_for_time_type(
        &self,
        token_address: &str,
        time_type: &str,
    ) -> Option<TimedTokenPrice> {
        self.timed_prices.latest(token_address, time_type).await
    }

    pub async fn get_time_type_token_prices(
        &self,
        token_address: &str,
        time_type: &str,
        from_time: i64,
        to_time: i64,
    ) -> Vec<TimedTokenPrice> {
        self.timed_prices
            .range(token_address, time_type, from_time, to_time)
            .await
    }

    pub async fn insert_token_prices_time_type(&self, prices: &[TimedTokenPrice]) {
        self.timed_prices.insert(prices).await
    }

    /// Returns the number of schema statements that failed.
    pub async fn ensure_schema(&self) -> usize {
        postgres::ensure_schema(&self.runner).await
    }

    pub fn failed_statements(&self) -> u64 {
        self.runner.failed_statements()
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        match &self.postgres {
            Some(postgres) => postgres.health_check().await,
            None => Ok(()),
        }
    }

    pub fn close(&self) {
        if let Some(postgres) = &self.postgres {
            postgres.close();
        }
    }
}
