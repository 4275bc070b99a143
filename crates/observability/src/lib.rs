//! `gatekeeper-observability` — process-wide tracing setup.
//!
//! The guards emit the security audit trail (logins, context switches,
//! impersonation) through `tracing`; this crate wires the subscriber.

mod tracing_init;

pub use tracing_init::init;
