use serde::{Deserialize, Serialize};

use crate::db::postgres::Record;

/// Raw price observation (`token_prices` row).
///
/// Append-only: no primary key, duplicates for the same
/// `(token_address, unix_time)` are allowed. Price columns are nullable and
/// older rows may carry NULLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub unix_time: i64,
    pub token_address: String,
    pub price_in_usd: Option<f64>,
    pub price_in_kda: Option<f64>,
}

impl TokenPrice {
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            unix_time: record.get_i64("unix_time")?,
            token_address: record.get_str("token_address")?.to_string(),
            price_in_usd: record.get_nullable_f64("price_in_usd")?,
            price_in_kda: record.get_nullable_f64("price_in_kda")?,
        })
    }
}

/// Incoming price for a token; the store stamps the observation time.
///
/// Missing prices are stored as NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTokenPrice {
    pub token_address: String,
    pub price_in_usd: Option<f64>,
    pub price_in_kda: Option<f64>,
}

impl NewTokenPrice {
    pub fn new(token_address: impl Into<String>, price_in_usd: f64, price_in_kda: f64) -> Self {
        Self {
            token_address: token_address.into(),
            price_in_usd: Some(price_in_usd),
            price_in_kda: Some(price_in_kda),
        }
    }
}
