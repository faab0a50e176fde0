use log::{info, warn};

use super::executor::{QueryRunner, Statement};

/// Tables, indexes and the `token_address` widening migration.
///
/// Every statement is safe to repeat. The ALTERs are re-issued on each call
/// so tables created with the older VARCHAR(32) column get widened.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "token_prices" (
    "unix_time" BIGINT,
    "token_address" VARCHAR(32) NOT NULL,
    "price_in_usd" FLOAT,
    "price_in_kda" FLOAT
);
CREATE INDEX IF NOT EXISTS token_address_time ON token_prices (token_address, unix_time);
CREATE TABLE IF NOT EXISTS "token_prices_timed" (
    "time_type" VARCHAR(16),
    "unix_time" BIGINT,
    "token_address" VARCHAR(32) NOT NULL,
    "price_in_usd_low" FLOAT,
    "price_in_usd_high" FLOAT,
    "price_in_usd_start" FLOAT,
    "price_in_usd_end" FLOAT,
    "price_in_kda_low" FLOAT,
    "price_in_kda_high" FLOAT,
    "price_in_kda_start" FLOAT,
    "price_in_kda_end" FLOAT
);
CREATE INDEX IF NOT EXISTS token_address_type_time ON token_prices_timed (token_address, time_type, unix_time);
ALTER TABLE "token_prices" ALTER COLUMN "token_address" TYPE VARCHAR(128);
ALTER TABLE "token_prices_timed" ALTER COLUMN "token_address" TYPE VARCHAR(128);
"#;

/// Split SQL into statements, respecting dollar-quoted strings.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_dollar_quote = false;
    let bytes = sql.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if i + 1 < bytes.len() && bytes[i] == b'$' && bytes[i + 1] == b'$' {
            in_dollar_quote = !in_dollar_quote;
            i += 2;
            continue;
        }

        if bytes[i] == b';' && !in_dollar_quote {
            let stmt = sql[start..i].trim();
            if !stmt.is_empty() {
                statements.push(stmt);
            }
            start = i + 1;
        }
        i += 1;
    }

    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }

    statements
}

/// Creates both price tables if absent and widens `token_address`.
///
/// Statements run in order through the soft executor; a failing statement
/// is logged and the rest still run. Returns how many statements failed.
pub async fn ensure_schema(runner: &QueryRunner) -> usize {
    let mut failed = 0;

    for stmt in split_sql_statements(SCHEMA) {
        if runner.execute_checked(&Statement::new(stmt)).await.is_none() {
            failed += 1;
        }
    }

    if failed > 0 {
        warn!("Schema ensure finished with {} failed statements", failed);
    } else {
        info!("Price tables ensured");
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::super::executor::mock::*;
    use super::*;

    #[test]
    fn test_split_schema_into_statements() {
        let statements = split_sql_statements(SCHEMA);
        assert_eq!(statements.len(), 6);
        assert!(statements[0].starts_with(r#"CREATE TABLE IF NOT EXISTS "token_prices""#));
        assert!(statements[1].contains("ON token_prices (token_address, unix_time)"));
        assert!(statements[3].contains("ON token_prices_timed (token_address, time_type, unix_time)"));
        assert!(statements[4].ends_with("VARCHAR(128)"));
        assert!(statements[5].ends_with("VARCHAR(128)"));
    }

    #[test]
    fn test_split_respects_dollar_quotes() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN PERFORM 1; END $$ LANGUAGE plpgsql; SELECT 1";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("PERFORM 1; END"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_index_names_are_distinct() {
        let statements = split_sql_statements(SCHEMA);
        assert!(statements[1].contains("token_address_time ON"));
        assert!(statements[3].contains("token_address_type_time ON"));
    }

    #[tokio::test]
    async fn test_ensure_schema_is_repeatable() {
        let executor = MockExecutor::empty();
        let runner = runner(&executor);

        for _ in 0..3 {
            assert_eq!(ensure_schema(&runner).await, 0);
        }

        let statements = executor.statements();
        assert_eq!(statements.len(), 18);
        assert_eq!(statements[0..6], statements[12..18]);
        assert!(statements.iter().all(|s| s.params.is_empty()));
    }

    #[tokio::test]
    async fn test_ensure_schema_continues_after_failure() {
        let executor = MockExecutor::new(|stmt| {
            if stmt.sql.starts_with("CREATE INDEX") {
                Err(failure())
            } else {
                Ok(Vec::new())
            }
        });
        let runner = runner(&executor);

        assert_eq!(ensure_schema(&runner).await, 2);
        assert_eq!(executor.statements().len(), 6);
    }
}
