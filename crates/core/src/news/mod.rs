pub mod rss;
pub mod search;

pub use rss::{FeedClient, FeedEntry, GoogleNewsRss};
pub use search::{search, DelayRange, SearchOptions};
