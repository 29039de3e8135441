use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use prometheus::{IntCounterVec, Opts, Registry, proto::MetricFamily};
use tracing::{debug, warn};

use tagstorm_core::MetricsScope;
use tagstorm_model::Tags;

use crate::snapshot::{CounterSnapshot, ScopeSnapshot};

/// Counter name plus label values in label-name order.
type SeriesKey = (String, Vec<String>);

#[derive(Debug)]
struct Family {
    counters: IntCounterVec,
    label_names: Vec<String>,
}

/// Prometheus-backed tagged counter aggregate.
///
/// One `IntCounterVec` is registered lazily per counter name. Its label names are the tag keys
/// of the first increment seen for that name; later increments must use the same keys.
/// Common tags (`env`, `service`) are attached to every counter as const labels.
///
/// ## Series expiry
/// Every increment refreshes the series' last-touch instant. [`PrometheusScope::expire`] drops
/// series that were not touched within the given period, so long runs with high-cardinality tags
/// don't keep reporting dead series.
#[derive(Debug)]
pub struct PrometheusScope {
    registry: Registry,
    common: HashMap<String, String>,
    families: RwLock<HashMap<String, Family>>,
    touched: Mutex<HashMap<SeriesKey, Instant>>,
    rejected: AtomicU64,
}

impl PrometheusScope {
    /// Create a scope with its own registry.
    pub fn new(common: Tags) -> Self {
        Self {
            registry: Registry::new(),
            common: common.0.into_iter().collect(),
            families: RwLock::new(HashMap::new()),
            touched: Mutex::new(HashMap::new()),
            rejected: AtomicU64::new(0),
        }
    }

    /// Gather all metric families for encoding.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Number of increments dropped because of invalid names or mismatched tag keys.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Number of live series across all counters.
    pub fn series(&self) -> usize {
        self.touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Read back the current counter state.
    ///
    /// Debug/test capability: counters whose series all expired are omitted.
    pub fn snapshot(&self) -> ScopeSnapshot {
        let counters = self
            .gather()
            .iter()
            .map(|family| {
                let metrics = family.get_metric();
                let total = metrics
                    .iter()
                    .map(|m| m.get_counter().value() as u64)
                    .sum();
                (
                    family.name().to_string(),
                    CounterSnapshot {
                        series: metrics.len(),
                        total,
                    },
                )
            })
            .collect();
        ScopeSnapshot { counters }
    }

    /// Remove series untouched for longer than `max_age`.
    ///
    /// Stale keys are taken out under the touch lock; the prometheus series are removed after
    /// it is released, so increments are not held up by the removal. An increment landing on a
    /// stale series between the two steps may be lost together with that series.
    ///
    /// Returns the number of removed series.
    pub fn expire(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut stale: Vec<SeriesKey> = Vec::new();
        {
            let mut touched = self.touched.lock().unwrap_or_else(PoisonError::into_inner);
            touched.retain(|key, at| {
                let keep = now.saturating_duration_since(*at) <= max_age;
                if !keep {
                    stale.push(key.clone());
                }
                keep
            });
        }
        if stale.is_empty() {
            return 0;
        }

        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        for (name, values) in &stale {
            if let Some(family) = families.get(name) {
                if let Err(e) = family.counters.remove_label_values(values) {
                    debug!(counter = %name, error = %e, "series already gone");
                }
            }
        }
        debug!(expired = stale.len(), "expired stale series");
        stale.len()
    }

    fn family(&self, name: &str, tags: &Tags) -> Result<IntCounterVec, prometheus::Error> {
        {
            let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(family) = families.get(name) {
                return matching(family, tags);
            }
        }

        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(family) = families.get(name) {
            return matching(family, tags);
        }

        let label_names: Vec<String> = tags.keys().map(str::to_string).collect();
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let counters = IntCounterVec::new(
            Opts::new(name, format!("tagged counter {name}")).const_labels(self.common.clone()),
            &label_refs,
        )?;
        self.registry.register(Box::new(counters.clone()))?;
        debug!(counter = name, labels = ?label_names, "registered counter");

        families.insert(
            name.to_string(),
            Family {
                counters: counters.clone(),
                label_names,
            },
        );
        Ok(counters)
    }

    fn reject(&self, name: &str, error: &prometheus::Error) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(counter = name, error = %error, "increment rejected");
    }
}

fn matching(family: &Family, tags: &Tags) -> Result<IntCounterVec, prometheus::Error> {
    if family.label_names.iter().map(String::as_str).eq(tags.keys()) {
        Ok(family.counters.clone())
    } else {
        Err(prometheus::Error::Msg(format!(
            "tag keys {:?} do not match registered labels {:?}",
            tags.keys().collect::<Vec<_>>(),
            family.label_names
        )))
    }
}

impl MetricsScope for PrometheusScope {
    fn inc_counter(&self, name: &str, tags: &Tags, delta: u64) {
        let counters = match self.family(name, tags) {
            Ok(counters) => counters,
            Err(e) => return self.reject(name, &e),
        };
        let values: Vec<String> = tags.values().map(str::to_string).collect();

        // Touch first: a concurrent expire must not detach the series we are about to bump.
        self.touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((name.to_string(), values.clone()), Instant::now());

        match counters.get_metric_with_label_values(&values) {
            Ok(counter) => counter.inc_by(delta),
            Err(e) => self.reject(name, &e),
        }
    }
}
