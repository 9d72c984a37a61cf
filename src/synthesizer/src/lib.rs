//! Synthetic telemetry generators.
//!
//! Each generator is a pure, CPU-bound computation: given a config and a
//! [`common::sampling::Sampler`], it produces value objects from
//! `common::model`. Generators never talk to each other directly; shared
//! inputs (service fleet, time window) arrive through their configs, and the
//! querier crate is the integration point.

pub mod alerts;
pub mod logs;
pub mod metrics;
pub mod topology;
pub mod traces;

mod templates;

/// Fail-fast error for malformed generator parameters. Generation itself
/// never fails once a config validates; degenerate inputs produce empty or
/// single-element results instead.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("invalid generator configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

pub(crate) fn require(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(GeneratorError::InvalidConfig(message.into()))
    }
}
