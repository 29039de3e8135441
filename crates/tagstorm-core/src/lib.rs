pub mod error;
pub mod generator;
pub mod pool;
pub mod scope;

pub use error::{CoreError, CoreResult};
pub use generator::{GeneratorConfig, LoadGenerator, RunSummary};
pub use pool::{Token, TokenPool};
pub use scope::{MetricsScope, NoOpScope, ScopeHandle, noop_scope};
