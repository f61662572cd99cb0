use crate::models::{Metric, MetricSeries};
use std::fmt;

/// Headline numbers for one recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub peak_heap_alloc_mb: f64,
    pub min_heap_alloc_mb: f64,
    pub mean_heap_alloc_mb: f64,
    pub peak_heap_objects: u64,
    pub peak_goroutines: u64,
    /// Last counter value minus the first. Assumes the counter never resets.
    pub total_gc_cycles: i128,
}

impl Summary {
    pub fn of(series: &MetricSeries) -> Self {
        let (min, max, sum) = series.values(Metric::HeapAllocMb).fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
        );
        let rows = series.rows();
        Self {
            peak_heap_alloc_mb: max,
            min_heap_alloc_mb: min,
            // rounding in the sum can push a flat series a hair past its max
            mean_heap_alloc_mb: (sum / series.len() as f64).clamp(min, max),
            peak_heap_objects: rows.iter().map(|r| r.heap_objects).max().unwrap_or(0),
            peak_goroutines: rows.iter().map(|r| r.goroutines).max().unwrap_or(0),
            total_gc_cycles: i128::from(series.last().gc_cycles)
                - i128::from(series.first().gc_cycles),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Peak Heap Alloc: {:.2} MB", self.peak_heap_alloc_mb)?;
        writeln!(f, "Min Heap Alloc: {:.2} MB", self.min_heap_alloc_mb)?;
        writeln!(f, "Avg Heap Alloc: {:.2} MB", self.mean_heap_alloc_mb)?;
        writeln!(f, "Peak Objects: {}", group_thousands(self.peak_heap_objects))?;
        writeln!(f, "Peak Goroutines: {}", self.peak_goroutines)?;
        writeln!(f, "Total GC Cycles: {}", self.total_gc_cycles)
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
