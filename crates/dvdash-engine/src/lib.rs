//! Ingestion engine: call-session tracking, status aggregation, bounded
//! history and live fanout, behind the [`Dashboard`] entry point.

pub mod dashboard;
pub mod event;
pub mod fanout;
pub mod history;
pub mod sessions;
pub mod status;

pub use dashboard::{Backfill, Dashboard, DashboardConfig};
pub use event::DashboardEvent;
pub use fanout::{Fanout, PublishReport, SubscriberId, Subscription};
pub use history::HistoryBuffer;
pub use sessions::SessionTracker;
pub use status::StatusAggregator;
