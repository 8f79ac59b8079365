pub mod yahoo;

// Re-export the client for convenient access (e.g. `use crate::market_data::YahooClient`).
pub use yahoo::{FetchError, YahooClient};
