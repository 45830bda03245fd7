//! Listings Module
//! Mission: Rental listings, the query builder that scopes them, and their API

pub mod api;
pub mod models;
pub mod query;
pub mod store;

pub use models::{Listing, ListingView};
pub use query::{ListingFilters, ListingQuery, ListingScope};
pub use store::ListingStore;
