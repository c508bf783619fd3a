pub mod builder;
pub mod collector;
pub mod exposition;
pub mod types;

pub use builder::{ObservationBuilder, UNCATEGORIZED};
pub use collector::{Collector, group_into_families};
pub use exposition::{CONTENT_TYPE, render_text};
pub use types::{Labels, MetricFamily, MetricKind, Observation, ObservationValue, Sample};
