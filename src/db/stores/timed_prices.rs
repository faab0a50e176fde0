use std::sync::Arc;

use log::info;

use super::decode_rows;
use crate::db::models::TimedTokenPrice;
use crate::db::postgres::{ensure_schema, QueryRunner, Statement};

/// Time-bucketed prices (`token_prices_timed`), keyed by token and time type.
#[derive(Clone)]
pub struct TimedPriceStore {
    runner: Arc<QueryRunner>,
}

impl TimedPriceStore {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self {
            runner,
        }
    }

    /// Inserts buckets as given, one statement each, best-effort.
    pub async fn insert(&self, prices: &[TimedTokenPrice]) {
        if prices.is_empty() {
            return;
        }

        ensure_schema(&self.runner).await;

        let query = r#"
            INSERT INTO token_prices_timed (
                time_type, unix_time, token_address,
                price_in_usd_low, price_in_usd_high, price_in_usd_start, price_in_usd_end,
                price_in_kda_low, price_in_kda_high, price_in_kda_start, price_in_kda_end
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#;

        for price in prices {
            let stmt = Statement::new(query)
                .bind(price.time_type.as_deref())
                .bind(price.unix_time)
                .bind(price.token_address.as_str())
                .bind(price.price_in_usd_low)
                .bind(price.price_in_usd_high)
                .bind(price.price_in_usd_start)
                .bind(price.price_in_usd_end)
                .bind(price.price_in_kda_low)
                .bind(price.price_in_kda_high)
                .bind(price.price_in_kda_start)
                .bind(price.price_in_kda_end);
            self.runner.execute(&stmt).await;
        }

        info!("Inserted {} timed token prices", prices.len());
    }

    /// Most recent bucket for a token and time type.
    pub async fn latest(&self, token_address: &str, time_type: &str) -> Option<TimedTokenPrice> {
        if token_address.is_empty() {
            return None;
        }

        let stmt = Statement::new(
            r#"
            SELECT * FROM token_prices_timed
            WHERE token_address = $1 AND time_type = $2
            ORDER BY unix_time DESC
            LIMIT 1
            "#,
        )
        .bind(token_address)
        .bind(time_type);

        let rows = self.runner.execute(&stmt).await;
        decode_rows(&rows, TimedTokenPrice::from_record, "token_prices_timed")
            .into_iter()
            .next()
    }

    /// All buckets in `[from_time, to_time]`, unordered and never sampled.
    pub async fn range(
        &self,
        token_address: &str,
        time_type: &str,
        from_time: i64,
        to_time: i64,
    ) -> Vec<TimedTokenPrice> {
        if token_address.is_empty() {
            return Vec::new();
        }

        let stmt = Statement::new(
            r#"
            SELECT * FROM token_prices_timed
            WHERE token_address = $1 AND time_type = $2
                AND unix_time >= $3 AND unix_time <= $4
            "#,
        )
        .bind(token_address)
        .bind(time_type)
        .bind(from_time)
        .bind(to_time);

        let rows = self.runner.execute(&stmt).await;
        decode_rows(&rows, TimedTokenPrice::from_record, "token_prices_timed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::postgres::mock::*;
    use crate::db::postgres::{Record, SqlParam, SqlValue};

    fn bucket(unix_time: i64) -> TimedTokenPrice {
        TimedTokenPrice {
            time_type: Some("1H".to_string()),
            unix_time,
            token_address: "coin".to_string(),
            price_in_usd_low: Some(1.0),
            price_in_usd_high: Some(2.0),
            price_in_usd_start: Some(1.5),
            price_in_usd_end: Some(1.8),
            price_in_kda_low: Some(3.0),
            price_in_kda_high: Some(4.0),
            price_in_kda_start: Some(3.5),
            price_in_kda_end: Some(3.8),
        }
    }

    fn double(value: Option<f64>) -> SqlValue {
        value.map_or(SqlValue::Null, SqlValue::Double)
    }

    fn bucket_row(price: &TimedTokenPrice) -> Record {
        Record::new()
            .with("time_type", price.time_type.clone().map_or(SqlValue::Null, SqlValue::Text))
            .with("unix_time", SqlValue::BigInt(price.unix_time))
            .with("token_address", SqlValue::Text(price.token_address.clone()))
            .with("price_in_usd_low", double(price.price_in_usd_low))
            .with("price_in_usd_high", double(price.price_in_usd_high))
            .with("price_in_usd_start", double(price.price_in_usd_start))
            .with("price_in_usd_end", double(price.price_in_usd_end))
            .with("price_in_kda_low", double(price.price_in_kda_low))
            .with("price_in_kda_high", double(price.price_in_kda_high))
            .with("price_in_kda_start", double(price.price_in_kda_start))
            .with("price_in_kda_end", double(price.price_in_kda_end))
    }

    #[tokio::test]
    async fn test_empty_insert_issues_nothing() {
        let executor = MockExecutor::empty();
        TimedPriceStore::new(runner(&executor)).insert(&[]).await;
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_insert_keeps_caller_timestamps() {
        let executor = MockExecutor::empty();
        let prices = vec![bucket(3_600), bucket(7_200)];

        TimedPriceStore::new(runner(&executor)).insert(&prices).await;

        let statements = executor.statements();
        assert_eq!(statements.len(), 6 + 2);
        for (stmt, price) in statements[6..].iter().zip(&prices) {
            assert!(stmt.sql.contains("INSERT INTO token_prices_timed"));
            assert_eq!(stmt.params.len(), 11);
            assert_eq!(stmt.params[0], SqlParam::Text("1H".to_string()));
            assert_eq!(stmt.params[1], SqlParam::BigInt(price.unix_time));
            assert_eq!(stmt.params[2], SqlParam::Text("coin".to_string()));
            assert_eq!(stmt.params[3], SqlParam::Double(1.0));
            assert_eq!(stmt.params[10], SqlParam::Double(3.8));
        }
    }

    #[tokio::test]
    async fn test_latest_returns_none_without_rows() {
        let executor = MockExecutor::empty();
        let store = TimedPriceStore::new(runner(&executor));

        assert_eq!(store.latest("coin", "1D").await, None);
        let statements = executor.statements();
        assert!(statements[0].sql.contains("ORDER BY unix_time DESC"));
        assert!(statements[0].sql.contains("LIMIT 1"));
        assert_eq!(
            statements[0].params,
            vec![SqlParam::Text("coin".to_string()), SqlParam::Text("1D".to_string())]
        );
    }

    #[tokio::test]
    async fn test_latest_decodes_row() {
        let expected = bucket(86_400);
        let row = bucket_row(&expected);
        let executor = MockExecutor::new(move |_| Ok(vec![row.clone()]));

        let latest = TimedPriceStore::new(runner(&executor)).latest("coin", "1H").await;
        assert_eq!(latest, Some(expected));
    }

    #[tokio::test]
    async fn test_insert_binds_missing_values_as_null() {
        let executor = MockExecutor::empty();
        let mut price = bucket(3_600);
        price.time_type = None;
        price.price_in_kda_end = None;

        TimedPriceStore::new(runner(&executor)).insert(&[price]).await;

        let insert = executor.statements().pop().unwrap();
        assert_eq!(insert.params[0], SqlParam::NullText);
        assert_eq!(insert.params[10], SqlParam::NullDouble);
    }

    #[tokio::test]
    async fn test_range_keeps_buckets_with_null_prices() {
        let mut partial = bucket(20);
        partial.price_in_usd_high = None;
        partial.price_in_kda_low = None;
        let rows = vec![bucket_row(&bucket(10)), bucket_row(&partial)];
        let executor = MockExecutor::new(move |_| Ok(rows.clone()));

        let prices = TimedPriceStore::new(runner(&executor)).range("coin", "1H", 0, 30).await;
        assert_eq!(prices, vec![bucket(10), partial]);
    }

    #[tokio::test]
    async fn test_range_binds_bounds() {
        let rows: Vec<Record> = [bucket(10), bucket(20), bucket(30)].iter().map(bucket_row).collect();
        let executor = MockExecutor::new(move |_| Ok(rows.clone()));
        let store = TimedPriceStore::new(runner(&executor));

        let prices = store.range("coin", "1H", 10, 30).await;
        assert_eq!(prices.len(), 3);

        let stmt = &executor.statements()[0];
        assert!(!stmt.sql.contains("row_number"));
        assert_eq!(stmt.params[2], SqlParam::BigInt(10));
        assert_eq!(stmt.params[3], SqlParam::BigInt(30));
    }

    #[tokio::test]
    async fn test_reads_with_empty_token_short_circuit() {
        let executor = MockExecutor::empty();
        let store = TimedPriceStore::new(runner(&executor));

        assert_eq!(store.latest("", "1H").await, None);
        assert!(store.range("", "1H", 0, 10).await.is_empty());
        assert!(executor.statements().is_empty());
    }
}
