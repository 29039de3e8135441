//! Metrics scope abstraction for the load generator.
//!
//! Every unit of work records one tagged counter increment through a [`MetricsScope`].
//! Aggregation backends (prometheus, in-memory test doubles, etc) implement the trait and are injected as a [`ScopeHandle`].
mod backend;
pub use backend::{MetricsScope, ScopeHandle};

mod noop;
pub use noop::NoOpScope;

use std::sync::Arc;

/// Create a no-op scope handle.
#[inline]
pub fn noop_scope() -> ScopeHandle {
    Arc::new(NoOpScope)
}
