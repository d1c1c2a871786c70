pub mod listings;
pub mod text;

pub use listings::{parse_listings, JobListing};
pub use text::extract_text;
