use std::collections::BTreeMap;

/// Per-counter view of the scope at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Distinct tag combinations recorded for this counter.
    pub series: usize,
    /// Sum over all series.
    pub total: u64,
}

/// Point-in-time read-back of a [`crate::PrometheusScope`], keyed by counter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    pub counters: BTreeMap<String, CounterSnapshot>,
}

impl ScopeSnapshot {
    /// Number of distinct counter names holding at least one series.
    pub fn distinct_counters(&self) -> usize {
        self.counters.len()
    }

    /// Number of series across all counters.
    pub fn series(&self) -> usize {
        self.counters.values().map(|c| c.series).sum()
    }

    /// Sum of every counter.
    pub fn total(&self) -> u64 {
        self.counters.values().map(|c| c.total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snap = ScopeSnapshot::default();
        assert_eq!(snap.distinct_counters(), 0);
        assert_eq!(snap.series(), 0);
        assert_eq!(snap.total(), 0);
    }

    #[test]
    fn sums_across_counters() {
        let mut snap = ScopeSnapshot::default();
        snap.counters.insert(
            "counter0".into(),
            CounterSnapshot {
                series: 3,
                total: 10,
            },
        );
        snap.counters.insert(
            "counter1".into(),
            CounterSnapshot {
                series: 1,
                total: 2,
            },
        );

        assert_eq!(snap.distinct_counters(), 2);
        assert_eq!(snap.series(), 4);
        assert_eq!(snap.total(), 12);
    }
}
