use std::{sync::Arc, time::Duration};

use opentelemetry::KeyValue;

pub mod in_memory;
pub mod otel;

/// Receives every measurement of an exchange.
///
/// Implementations are shared by all exchanges going through a middleware and get called
/// concurrently. None of the calls may fail the exchange: errors are handled, or dropped, by the
/// implementation.
pub trait Recorder: Send + Sync + 'static {
    /// Adds `quantity` to the number of exchanges in flight: 1 when one starts, -1 when it ends.
    fn add_in_flight(&self, quantity: i64, attributes: &[KeyValue]);

    /// Adds `quantity` to the number of completed exchanges.
    fn add_requests(&self, quantity: u64, attributes: &[KeyValue]);

    /// Records how long an exchange took.
    fn record_duration(&self, elapsed: Duration, attributes: &[KeyValue]);

    /// Records the approximate size of a request, in bytes.
    fn record_request_size(&self, bytes: i64, attributes: &[KeyValue]);

    /// Records the size of a response body, in bytes. Negative when the transport did not know it.
    fn record_response_size(&self, bytes: i64, attributes: &[KeyValue]);
}

impl<R: Recorder + ?Sized> Recorder for Arc<R> {
    fn add_in_flight(&self, quantity: i64, attributes: &[KeyValue]) {
        (**self).add_in_flight(quantity, attributes);
    }

    fn add_requests(&self, quantity: u64, attributes: &[KeyValue]) {
        (**self).add_requests(quantity, attributes);
    }

    fn record_duration(&self, elapsed: Duration, attributes: &[KeyValue]) {
        (**self).record_duration(elapsed, attributes);
    }

    fn record_request_size(&self, bytes: i64, attributes: &[KeyValue]) {
        (**self).record_request_size(bytes, attributes);
    }

    fn record_response_size(&self, bytes: i64, attributes: &[KeyValue]) {
        (**self).record_response_size(bytes, attributes);
    }
}
