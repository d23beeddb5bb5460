//! Event broadcast foundation.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
