#![cfg_attr(test, allow(unused_crate_dependencies))]
//! OpenTelemetry request metrics for HTTP exchanges.
//!
//! The same measurement runs around every exchange, whether it's a request handled by a server
//! ([`server::ServerMetricsLayer`]) or one sent through an outbound transport
//! ([`client::ClientMetricsLayer`]). Each exchange feeds a [`Recorder`] with the number of
//! requests in flight, the number of completed requests, their duration and payload sizes.
//!
//! ```no_run
//! use http_metrics::{meter, server::ServerMetricsLayer, MetricsOption};
//! use opentelemetry::metrics::noop::NoopMeterProvider;
//!
//! let meter = meter(&NoopMeterProvider::new());
//! let layer = ServerMetricsLayer::new(&meter, [MetricsOption::disable_grouped_status()]);
//! ```

/// Attribute derivation
pub mod attributes;
/// Override operations and the resulting configuration
pub mod config;
/// Potential errors from this crate
pub mod error;
/// Measurement sinks
pub mod recorder;
/// Approximate request sizes
pub mod size;

/// Outbound transport decorator
pub mod client;
/// Inbound middleware
pub mod server;

mod exchange;
mod future;

pub use attributes::{Exchange, RouteTemplate};
pub use config::{Config, Direction, MetricsOption};
pub use error::HttpMetricsError;
pub use future::ResponseFuture;
pub use recorder::Recorder;

use opentelemetry::metrics::{Meter, MeterProvider};

pub(crate) const SCOPE: &str = "http-metrics";
pub(crate) const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates the [`Meter`] this crate's instruments are registered with.
pub fn meter<P: MeterProvider>(provider: &P) -> Meter {
    provider.versioned_meter(SCOPE, Some(SCOPE_VERSION), None::<&'static str>, None)
}
