use serde::{Deserialize, Serialize};

use crate::db::postgres::Record;

/// Pre-aggregated price window (`token_prices_timed` row).
///
/// `time_type` names the bucket granularity (hourly, daily, ...) and
/// `unix_time` is the bucket start. Each bucket carries low/high/start/end
/// for both the USD and the KDA price. Everything except the token address
/// is nullable in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTokenPrice {
    pub time_type: Option<String>,
    pub unix_time: i64,
    pub token_address: String,
    pub price_in_usd_low: Option<f64>,
    pub price_in_usd_high: Option<f64>,
    pub price_in_usd_start: Option<f64>,
    pub price_in_usd_end: Option<f64>,
    pub price_in_kda_low: Option<f64>,
    pub price_in_kda_high: Option<f64>,
    pub price_in_kda_start: Option<f64>,
    pub price_in_kda_end: Option<f64>,
}

impl TimedTokenPrice {
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            time_type: record.get_nullable_str("time_type")?.map(str::to_string),
            unix_time: record.get_i64("unix_time")?,
            token_address: record.get_str("token_address")?.to_string(),
            price_in_usd_low: record.get_nullable_f64("price_in_usd_low")?,
            price_in_usd_high: record.get_nullable_f64("price_in_usd_high")?,
            price_in_usd_start: record.get_nullable_f64("price_in_usd_start")?,
            price_in_usd_end: record.get_nullable_f64("price_in_usd_end")?,
            price_in_kda_low: record.get_nullable_f64("price_in_kda_low")?,
            price_in_kda_high: record.get_nullable_f64("price_in_kda_high")?,
            price_in_kda_start: record.get_nullable_f64("price_in_kda_start")?,
            price_in_kda_end: record.get_nullable_f64("price_in_kda_end")?,
        })
    }
}
