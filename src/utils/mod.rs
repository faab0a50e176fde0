//! Utility functions for the price ledger.
//!
//! - [`time`] - Wall-clock helpers and the default history window

mod time;

pub use time::{default_window, unix_now, THIRTY_DAYS_SECONDS};
