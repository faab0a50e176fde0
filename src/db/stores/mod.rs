mod timed_prices;
mod token_prices;

use log::warn;

pub use timed_prices::TimedPriceStore;
pub use token_prices::{sampling_modulo, TokenPriceStore, SAMPLE_TARGET, SAMPLE_THRESHOLD};

use crate::db::postgres::Record;

/// Decodes rows, skipping (and logging) any that do not fit the model.
fn decode_rows<T>(rows: &[Record], decode: fn(&Record) -> Option<T>, table: &str) -> Vec<T> {
    let decoded: Vec<T> = rows.iter().filter_map(decode).collect();
    if decoded.len() < rows.len() {
        warn!(
            "Skipped {} undecodable {} rows",
            rows.len() - decoded.len(),
            table
        );
    }
    decoded
}
