//! Port interfaces for the application layer
//!
//! Ports define the contract between the application logic (stores) and the
//! backend collaborator. The core only needs two backend capabilities:
//!
//! 1. **Push**: subscribe to change events for an entity ([`EntityFeedPort`])
//! 2. **Pull**: fetch an entity, a list or an aggregate now
//!    ([`EntityQueryPort`], [`AggregateFetchPort`])
//!
//! Navigation and time are ports as well so the stores stay testable.

mod aggregate_fetch;
mod clock;
mod entity_feed;
mod entity_query;
pub mod errors;
mod navigation;

pub use aggregate_fetch::AggregateFetchPort;
pub use clock::ClockPort;
pub use entity_feed::{EntityFeed, EntityFeedPort, FeedTeardown};
pub use entity_query::EntityQueryPort;
pub use errors::{BackendError, FeedError, NavigationError};
pub use navigation::NavigationPort;
