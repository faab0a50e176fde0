mod timed_token_price;
mod token_price;

pub use timed_token_price::TimedTokenPrice;
pub use token_price::{NewTokenPrice, TokenPrice};
