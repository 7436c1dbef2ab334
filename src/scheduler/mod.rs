//! Recompute Scheduler
//!
//! Responsible for:
//! - Routing applied store events to recompute topics
//! - Debouncing and coalescing triggers per topic
//! - Gating runs on per-topic preconditions over the store and derived state
//! - Publishing derived tables and triggering downstream topics
//! - The `Dashboard` facade readers and sources talk to

mod dashboard;
mod runner;
mod topic;

pub use dashboard::{Dashboard, DashboardOptions, EventSender};
pub use topic::{routes, Topic, TopicState};
