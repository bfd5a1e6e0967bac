//! Stock market collaborators: quote page headlines and daily price history.

pub mod headlines;
pub mod history;

pub use headlines::{HeadlineExtractor, HeadlineSource, SelectorExtractor};
pub use history::{PriceHistoryProvider, YahooChart};
