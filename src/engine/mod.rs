pub mod builder;
pub mod inspector;

pub use builder::{DefaultVulnerabilityBuilder, VulnerabilityBuilder};
pub use inspector::{CancelToken, EngineError, Inspector, DEFAULT_EVAL_BUDGET};
