use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlotError>;

/// Everything that can go wrong between reading a metrics table and writing
/// the chart. The binary reports all of them the same way.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("line {line}: cannot parse {column} value {value:?}: {reason}")]
    Parse {
        line: u64,
        column: &'static str,
        value: String,
        reason: String,
    },
    #[error("table has no data rows")]
    EmptySeries,
    #[error("delimiter {0:?} is not a single-byte character")]
    InvalidDelimiter(char),
    #[error("invalid figure geometry: {0}")]
    Geometry(String),
    #[error("no usable TrueType/OpenType font found; set chart.font in the config")]
    FontUnavailable,
    #[error("cannot load font {}", .0.display())]
    InvalidFont(PathBuf),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("writing {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}
