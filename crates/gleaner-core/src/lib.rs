pub mod delay;
pub mod error;
pub mod extract;
pub mod record;
pub mod scrape;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use delay::DelayRange;
pub use error::AppError;
pub use extract::{
    Anchor, extract_between, extract_list, extract_xml_element, first_anchor, strip_tags,
};
pub use record::{ExtractionRule, FieldRule, RuleSet, TargetRecord, UrlTemplate};
pub use scrape::{ReviewLine, ScrapeRunner, review};
pub use traits::Fetcher;
