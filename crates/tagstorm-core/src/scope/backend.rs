use std::sync::Arc;

use tagstorm_model::Tags;

/// Aggregation handle receiving tagged counter increments.
///
/// Implementations must tolerate concurrent calls from many units of work.
/// Flushing the aggregate to a collector is the backend's concern, not the caller's.
pub trait MetricsScope: Send + Sync + 'static {
    /// Add `delta` to the counter `name` under the given tag set.
    ///
    /// # Arguments
    /// - `name`: Counter name
    /// - `tags`: Dimensions of the increment
    /// - `delta`: Amount to add
    fn inc_counter(&self, name: &str, tags: &Tags, delta: u64);
}

/// Shared handle to a metrics scope.
///
/// Cloned into each spawned unit of work.
pub type ScopeHandle = Arc<dyn MetricsScope>;
