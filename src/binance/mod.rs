pub mod rest;
pub mod types;
pub mod ws;

pub use rest::BinanceRestClient;
pub use ws::BinanceWsClient;
