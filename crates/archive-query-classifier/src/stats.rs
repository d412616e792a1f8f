use dashmap::DashMap;

/// Rolling execution statistics for one table, updated after every
/// successful execution that touched it (spec §4.8: "estimated duration and
/// rows come from a rolling per-table statistics cache").
#[derive(Debug, Clone, Copy)]
struct TableStats {
    avg_rows: f64,
    avg_duration_ms: f64,
    samples: u64,
}

impl TableStats {
    fn observe(&mut self, rows: u64, duration_ms: u64) {
        self.samples += 1;
        // Exponential moving average so recent executions dominate without
        // needing to retain the full sample history.
        let alpha = 1.0 / (self.samples.min(20) as f64);
        self.avg_rows += (rows as f64 - self.avg_rows) * alpha;
        self.avg_duration_ms += (duration_ms as f64 - self.avg_duration_ms) * alpha;
    }
}

impl Default for TableStats {
    fn default() -> Self {
        Self {
            avg_rows: 1_000.0,
            avg_duration_ms: 50.0,
            samples: 0,
        }
    }
}

/// Per-table statistics cache shared across classifications for one process.
#[derive(Debug, Default)]
pub struct TableStatsCache {
    tables: DashMap<String, TableStats>,
}

impl TableStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful execution's observed cost for every table it
    /// touched.
    pub fn record(&self, tables: &[String], rows: u64, duration_ms: u64) {
        for table in tables {
            self.tables
                .entry(table.clone())
                .or_default()
                .observe(rows, duration_ms);
        }
    }

    /// Estimate `(rows, duration_ms)` for a query touching `tables`, summing
    /// per-table row estimates and taking the slowest table's duration as
    /// the dominant cost (a join is at least as slow as its slowest input).
    pub fn estimate(&self, tables: &[String]) -> (u64, u64) {
        if tables.is_empty() {
            return (TableStats::default().avg_rows as u64, TableStats::default().avg_duration_ms as u64);
        }

        let mut total_rows = 0.0;
        let mut max_duration = 0.0_f64;
        for table in tables {
            let stats = self.tables.get(table).map(|s| *s).unwrap_or_default();
            total_rows += stats.avg_rows;
            max_duration = max_duration.max(stats.avg_duration_ms);
        }

        (total_rows as u64, max_duration as u64)
    }
}
