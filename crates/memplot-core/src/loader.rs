use crate::config::LoaderConfig;
use crate::error::{PlotError, Result};
use crate::models::{Metric, MetricRow, MetricSeries, TIMESTAMP_COLUMN};
use crate::timeutils::{now_utc, parse_timestamp};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use time::Date;
use tracing::debug;

/// Reads a memory profile table from `path`. The first bad row fails the
/// whole load.
pub fn load_series(path: &Path, config: &LoaderConfig) -> Result<MetricSeries> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PlotError::FileNotFound(path.to_path_buf()),
        _ => PlotError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let series = read_series(file, config, now_utc().date())?;
    debug!(rows = series.len(), path = %path.display(), "loaded metrics table");
    Ok(series)
}

/// Parses a table from any reader. Bare times of day are placed on
/// `reference`.
pub fn read_series<R: Read>(
    reader: R,
    config: &LoaderConfig,
    reference: Date,
) -> Result<MetricSeries> {
    let delimiter = u8::try_from(config.delimiter)
        .map_err(|_| PlotError::InvalidDelimiter(config.delimiter))?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::locate(csv_reader.headers()?)?;
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(columns.parse_row(&record, line, reference)?);
    }
    MetricSeries::new(rows)
}

/// Indices of the required columns within a header row.
struct Columns {
    timestamp: usize,
    metrics: [usize; 5],
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(PlotError::MissingColumn(name))
        };
        let timestamp = find(TIMESTAMP_COLUMN)?;
        let mut metrics = [0usize; 5];
        for (slot, metric) in metrics.iter_mut().zip(Metric::ALL) {
            *slot = find(metric.column())?;
        }
        Ok(Self { timestamp, metrics })
    }

    fn parse_row(
        &self,
        record: &csv::StringRecord,
        line: u64,
        reference: Date,
    ) -> Result<MetricRow> {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let raw_ts = field(self.timestamp);
        let timestamp = parse_timestamp(raw_ts, reference).ok_or_else(|| PlotError::Parse {
            line,
            column: TIMESTAMP_COLUMN,
            value: raw_ts.to_string(),
            reason: "unrecognized date/time format".into(),
        })?;

        let mut floats = [0f64; 2];
        let mut counts = [0u64; 3];
        for (metric, &idx) in Metric::ALL.iter().zip(self.metrics.iter()) {
            let raw = field(idx);
            let bad = |reason: &str| PlotError::Parse {
                line,
                column: metric.column(),
                value: raw.to_string(),
                reason: reason.to_string(),
            };
            match metric {
                Metric::HeapAllocMb => floats[0] = parse_float(raw).map_err(bad)?,
                Metric::HeapInuseMb => floats[1] = parse_float(raw).map_err(bad)?,
                Metric::HeapObjects => counts[0] = parse_count(raw).map_err(bad)?,
                Metric::Goroutines => counts[1] = parse_count(raw).map_err(bad)?,
                Metric::GcCycles => counts[2] = parse_count(raw).map_err(bad)?,
            }
        }

        Ok(MetricRow {
            timestamp,
            heap_alloc_mb: floats[0],
            heap_inuse_mb: floats[1],
            heap_objects: counts[0],
            goroutines: counts[1],
            gc_cycles: counts[2],
        })
    }
}

fn parse_float(raw: &str) -> std::result::Result<f64, &'static str> {
    let value: f64 = raw.parse().map_err(|_| "not a number")?;
    if !value.is_finite() {
        return Err("not a finite number");
    }
    Ok(value)
}

fn parse_count(raw: &str) -> std::result::Result<u64, &'static str> {
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }
    let value = parse_float(raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err("not a non-negative integer");
    }
    Ok(value as u64)
}
