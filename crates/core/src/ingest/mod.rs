pub mod edgar;
pub mod exa;
pub mod feeds;
pub mod provider;
pub mod types;
pub mod yahoo;

pub use provider::{CompanySearch, FeedSource, FilingRepository, MarketDataProvider, NewsSearch};
