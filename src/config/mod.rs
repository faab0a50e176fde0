mod config;

pub use self::config::{ConnectionTarget, PostgresSettings, Settings};
