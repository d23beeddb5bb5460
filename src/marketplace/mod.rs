//! Typed interface to the external gig-labor marketplace.

pub mod client;
pub mod http;
pub mod mock;
pub mod types;

pub use client::{MarketplaceClient, MarketplaceError};
pub use http::HttpMarketplaceClient;
pub use mock::MockMarketplaceClient;
pub use types::{
    BookingRef, BookingRequest, BookingSnapshot, BookingStatus, SearchOutcome, SearchQuery, Worker,
};
