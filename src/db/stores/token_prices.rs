use std::sync::Arc;

use log::{debug, info};

use super::decode_rows;
use crate::db::models::{NewTokenPrice, TokenPrice};
use crate::db::postgres::{ensure_schema, QueryRunner, Statement};
use crate::utils::{default_window, unix_now};

/// Row count at which raw history reads start sampling.
pub const SAMPLE_THRESHOLD: i64 = 250;

/// Approximate number of rows a sampled read returns.
pub const SAMPLE_TARGET: i64 = 100;

const RANGE_FILTER: &str = "WHERE token_address = $1 AND unix_time >= $2 AND unix_time <= $3";

/// Modulo used to thin a raw history read, or `None` to return every row.
///
/// Sampled reads keep rows whose ascending `unix_time` rank (starting at 1)
/// is a multiple of the modulo, so the first row is never part of them and
/// the result is roughly `count / modulo` rows.
pub fn sampling_modulo(count: i64, unlimited: bool) -> Option<i64> {
    if unlimited || count < SAMPLE_THRESHOLD {
        return None;
    }
    Some((count + SAMPLE_TARGET - 1) / SAMPLE_TARGET)
}

/// Per-observation prices (`token_prices`).
#[derive(Clone)]
pub struct TokenPriceStore {
    runner: Arc<QueryRunner>,
}

impl TokenPriceStore {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self {
            runner,
        }
    }

    /// Inserts a batch of prices, all stamped with the current second.
    ///
    /// One statement per price, in order. A failed row is logged and
    /// skipped; nothing is rolled back.
    pub async fn insert(&self, prices: &[NewTokenPrice]) {
        if prices.is_empty() {
            return;
        }

        ensure_schema(&self.runner).await;

        let unix_time = unix_now();
        let query = r#"
            INSERT INTO token_prices (unix_time, token_address, price_in_usd, price_in_kda)
            VALUES ($1, $2, $3, $4)
        "#;

        for price in prices {
            let stmt = Statement::new(query)
                .bind(unix_time)
                .bind(price.token_address.as_str())
                .bind(price.price_in_usd)
                .bind(price.price_in_kda);
            self.runner.execute(&stmt).await;
        }

        info!("Inserted {} token prices at {}", prices.len(), unix_time);
    }

    /// Price history for a token, downsampled when the range is dense.
    ///
    /// Missing bounds default to the last 30 days. Rows are unordered unless
    /// sampling kicks in.
    pub async fn query(
        &self,
        token_address: &str,
        from_time: Option<i64>,
        to_time: Option<i64>,
        unlimited: bool,
    ) -> Vec<TokenPrice> {
        if token_address.is_empty() {
            return Vec::new();
        }

        let (from_time, to_time) = default_window(from_time, to_time, unix_now());

        let count_stmt =
            Statement::new(format!("SELECT count(*) FROM token_prices {}", RANGE_FILTER))
                .bind(token_address)
                .bind(from_time)
                .bind(to_time);
        // A failed count reads as zero rows
        let count = self
            .runner
            .execute(&count_stmt)
            .await
            .first()
            .and_then(|row| row.get_i64("count"))
            .unwrap_or(0);

        let modulo = sampling_modulo(count, unlimited);
        let sql = match modulo {
            None => format!("SELECT * FROM token_prices {}", RANGE_FILTER),
            Some(modulo) => {
                debug!(
                    "Sampling {} rows for {} with modulo {}",
                    count, token_address, modulo
                );
                format!(
                    r#"
                    SELECT t.*
                    FROM (
                        SELECT *, row_number() OVER (ORDER BY unix_time ASC) AS sample_rank
                        FROM token_prices {}
                    ) t
                    WHERE t.sample_rank % $4 = 0
                    "#,
                    RANGE_FILTER
                )
            },
        };

        let mut select_stmt =
            Statement::new(sql).bind(token_address).bind(from_time).bind(to_time);
        if let Some(modulo) = modulo {
            select_stmt = select_stmt.bind(modulo);
        }

        let rows = self.runner.execute(&select_stmt).await;
        decode_rows(&rows, TokenPrice::from_record, "token_prices")
    }
}
