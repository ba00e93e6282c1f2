pub mod crawler;
pub mod error;
pub mod result;
pub mod robots;
pub mod text;

pub use crawler::{SiteCrawler, normalize_url};
pub use error::ScanError;
pub use result::{CrawlTermination, InboundLink, PageGraph, PageNode, PageStatus};
pub use robots::RobotsRules;
