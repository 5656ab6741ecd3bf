use std::fmt;

/// Summary of a completed run. Computed once, after every request has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl Stats {
    /// `None` for an empty slice.
    pub fn from_elapsed(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min_ms = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_ms = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { count: values.len(), min_ms, max_ms, avg_ms })
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "--- Stats ---")?;
        writeln!(f, "Total requests: {}", self.count)?;
        writeln!(f, "Min: {:.2} ms", self.min_ms)?;
        writeln!(f, "Max: {:.2} ms", self.max_ms)?;
        writeln!(f, "Avg: {:.2} ms", self.avg_ms)
    }
}
