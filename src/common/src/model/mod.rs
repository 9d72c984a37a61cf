//! Shared telemetry value types.
//!
//! Every entity here is a plain value object produced by a generator and
//! owned by the querier's cache. Nothing is mutated after creation except
//! [`alert::AlertEvent`], whose acknowledge/resolve transitions go through
//! dedicated methods.

pub mod alert;
pub mod log;
pub mod metric;
pub mod span;
pub mod topology;
pub mod trace;
pub mod window;

pub use window::TimeWindow;
