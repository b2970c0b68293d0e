pub mod listings;

pub use listings::extract_listings;
