pub mod crawler;
pub mod email;
pub mod enrichment;
pub mod error;
pub mod pacing;
pub mod result;
pub mod search;

pub use crawler::SiteCrawler;
pub use email::EmailValidator;
pub use enrichment::{EnrichmentService, HunterClient};
pub use error::ScanError;
pub use pacing::Pacer;
pub use result::CrawlResult;
pub use search::{Locale, SearchHit, SearchProvider, SearchRequest, SerpApiClient};
