pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod render;
pub mod stats;
pub mod timeutils;

pub use config::{ChartConfig, Config, LoaderConfig, LoggingConfig};
pub use error::{PlotError, Result};
pub use loader::{load_series, read_series};
pub use models::{Metric, MetricRow, MetricSeries};
pub use render::{default_prefix, locate_font, output_path, Figure};
pub use stats::Summary;
pub use timeutils::parse_timestamp;
