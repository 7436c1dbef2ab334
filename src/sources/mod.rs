//! Data Sources
//!
//! Responsible for:
//! - Turning collaborator payloads into store events
//! - Replaying a captured JSON fixture
//! - Polling the public vault API, one event per endpoint

pub mod api;
pub mod fixture;

pub use api::{ApiSource, FetchReport};
pub use fixture::Fixture;
