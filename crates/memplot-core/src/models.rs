use crate::error::{PlotError, Result};
use itertools::{Itertools, MinMaxResult};
use time::OffsetDateTime;

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Numeric columns of a memory profile table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    HeapAllocMb,
    HeapInuseMb,
    HeapObjects,
    Goroutines,
    GcCycles,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::HeapAllocMb,
        Metric::HeapInuseMb,
        Metric::HeapObjects,
        Metric::Goroutines,
        Metric::GcCycles,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::HeapAllocMb => "heap_alloc_mb",
            Metric::HeapInuseMb => "heap_inuse_mb",
            Metric::HeapObjects => "heap_objects",
            Metric::Goroutines => "goroutines",
            Metric::GcCycles => "gc_cycles",
        }
    }

    /// Counters and gauges of whole units, as opposed to megabyte readings.
    pub fn is_count(self) -> bool {
        !matches!(self, Metric::HeapAllocMb | Metric::HeapInuseMb)
    }
}

/// One sample of the monitored process.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub timestamp: OffsetDateTime,
    pub heap_alloc_mb: f64,
    pub heap_inuse_mb: f64,
    pub heap_objects: u64,
    pub goroutines: u64,
    pub gc_cycles: u64,
}

impl MetricRow {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeapAllocMb => self.heap_alloc_mb,
            Metric::HeapInuseMb => self.heap_inuse_mb,
            Metric::HeapObjects => self.heap_objects as f64,
            Metric::Goroutines => self.goroutines as f64,
            Metric::GcCycles => self.gc_cycles as f64,
        }
    }
}

/// Samples in file order. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    rows: Vec<MetricRow>,
}

impl MetricSeries {
    pub fn new(rows: Vec<MetricRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(PlotError::EmptySeries);
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> &MetricRow {
        &self.rows[0]
    }

    pub fn last(&self) -> &MetricRow {
        &self.rows[self.rows.len() - 1]
    }

    pub fn values(&self, metric: Metric) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row.get(metric))
    }

    /// Earliest and latest timestamp. Rows are not assumed to be sorted.
    pub fn time_bounds(&self) -> (OffsetDateTime, OffsetDateTime) {
        match self.rows.iter().map(|row| row.timestamp).minmax() {
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
            MinMaxResult::OneElement(ts) => (ts, ts),
            MinMaxResult::NoElements => {
                let ts = self.first().timestamp;
                (ts, ts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(ts: OffsetDateTime, alloc: f64) -> MetricRow {
        MetricRow {
            timestamp: ts,
            heap_alloc_mb: alloc,
            heap_inuse_mb: alloc / 2.0,
            heap_objects: 100,
            goroutines: 4,
            gc_cycles: 1,
        }
    }

    #[test]
    fn empty_rows_are_rejected() {
        assert!(matches!(
            MetricSeries::new(Vec::new()),
            Err(PlotError::EmptySeries)
        ));
    }

    #[test]
    fn time_bounds_scan_unordered_rows() {
        let series = MetricSeries::new(vec![
            row(datetime!(2024-05-01 10:05:00 UTC), 1.0),
            row(datetime!(2024-05-01 10:00:00 UTC), 2.0),
            row(datetime!(2024-05-01 10:02:00 UTC), 3.0),
        ])
        .unwrap();
        let (lo, hi) = series.time_bounds();
        assert_eq!(lo, datetime!(2024-05-01 10:00:00 UTC));
        assert_eq!(hi, datetime!(2024-05-01 10:05:00 UTC));
        assert_eq!(series.first().heap_alloc_mb, 1.0);
        assert_eq!(series.last().heap_alloc_mb, 3.0);
    }

    #[test]
    fn metric_accessor_matches_fields() {
        let r = row(datetime!(2024-05-01 10:00:00 UTC), 8.0);
        assert_eq!(r.get(Metric::HeapInuseMb), 4.0);
        assert_eq!(r.get(Metric::HeapObjects), 100.0);
        assert!(Metric::GcCycles.is_count());
        assert!(!Metric::HeapAllocMb.is_count());
    }
}
