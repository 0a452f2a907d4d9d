//! Market-data adapters implementing [`PriceSource`](crate::PriceSource).

mod yahoo;

pub use yahoo::YahooAdapter;
