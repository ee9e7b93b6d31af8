//! Page exploration: link extraction and the per-page crawl driver.

mod crawl;
mod links;

pub use crawl::{NO_RESOURCE_IN_PAGE, PageCrawler};
pub use links::{ExtractedLinks, HrefExtractor, LinkExtractor, first_link};
