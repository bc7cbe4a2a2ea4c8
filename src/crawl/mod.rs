//! Crawl control: pacing, visited tracking, pagination, link following and
//! scroll-to-load around the extraction pipeline.

pub mod controller;
pub mod crawl_types;
pub mod links;
pub mod pagination;
pub mod scroll;
pub mod throttle;
pub mod visited;

pub use controller::{CrawlController, CrawlOutcome, CrawlSettings};
pub use crawl_types::{CrawlCheckpoint, CrawlQueue, FailureKind, StopReason};
pub use links::{link_priority, links_from_html, select_links, should_follow};
pub use pagination::next_page_url;
pub use scroll::{ScrollOutcome, ScrollSettings, scroll_to_load};
pub use throttle::HandlerThrottle;
pub use visited::VisitedSet;
