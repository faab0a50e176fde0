pub mod config;
pub mod db;
pub mod utils;

pub use crate::config::Settings;
pub use db::{Database, NewTokenPrice, TimedTokenPrice, TokenPrice};
