// Library exports for the binary and tests
pub mod chart;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod names;
pub mod period;
pub mod rank;
pub mod reply;
pub mod service;
pub mod status;
pub mod store;

pub use config::Config;
pub use detector::{Outcome, RepeatDetector};
pub use period::{PeriodKeys, PeriodKind};
pub use service::{RepeatEvent, RepeaterService};
pub use store::{AggregateStore, Category};
