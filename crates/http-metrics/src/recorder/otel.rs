use std::{sync::Arc, time::Duration};

use opentelemetry::{
    metrics::{noop::NoopSyncInstrument, Histogram, Meter, Unit, UpDownCounter},
    KeyValue,
};

use super::Recorder;
use crate::{config::Direction, error::HttpMetricsError};

pub const REQUEST_COUNT: &str = "request_count";
pub const DURATION: &str = "duration";
pub const ACTIVE_REQUESTS: &str = "active_requests";
pub const REQUEST_CONTENT_LENGTH: &str = "request_content_length";
pub const RESPONSE_CONTENT_LENGTH: &str = "response_content_length";

/// [Recorder] backed by OpenTelemetry instruments, named
/// `[{prefix}.]http.{server|client}.{metric}`.
#[derive(Clone)]
pub struct OtelRecorder {
    requests: UpDownCounter<i64>,
    duration: Histogram<u64>,
    active_requests: UpDownCounter<i64>,
    request_size: Histogram<i64>,
    response_size: Histogram<i64>,
}

impl OtelRecorder {
    /// Creates the instruments with the given meter. An instrument the meter refuses to create is
    /// replaced by a no-op one, so that its metric is missing while the others still work.
    pub fn new(meter: &Meter, direction: Direction, prefix: &str) -> Self {
        let instruments = Instruments::new(meter, direction, prefix);

        Self {
            requests: or_noop(instruments.requests()),
            duration: or_noop(instruments.duration()),
            active_requests: or_noop(instruments.active_requests()),
            request_size: or_noop(instruments.request_size()),
            response_size: or_noop(instruments.response_size()),
        }
    }

    /// Like [OtelRecorder::new], but fails on the first instrument that can't be created.
    pub fn try_new(meter: &Meter, direction: Direction, prefix: &str) -> Result<Self, HttpMetricsError> {
        let instruments = Instruments::new(meter, direction, prefix);

        Ok(Self {
            requests: instruments.requests()?,
            duration: instruments.duration()?,
            active_requests: instruments.active_requests()?,
            request_size: instruments.request_size()?,
            response_size: instruments.response_size()?,
        })
    }
}

impl Recorder for OtelRecorder {
    fn add_in_flight(&self, quantity: i64, attributes: &[KeyValue]) {
        self.active_requests.add(quantity, attributes);
    }

    fn add_requests(&self, quantity: u64, attributes: &[KeyValue]) {
        self.requests
            .add(i64::try_from(quantity).unwrap_or(i64::MAX), attributes);
    }

    fn record_duration(&self, elapsed: Duration, attributes: &[KeyValue]) {
        self.duration.record(whole_millis(elapsed), attributes);
    }

    fn record_request_size(&self, bytes: i64, attributes: &[KeyValue]) {
        self.request_size.record(bytes, attributes);
    }

    fn record_response_size(&self, bytes: i64, attributes: &[KeyValue]) {
        self.response_size.record(bytes, attributes);
    }
}

/// Sub-millisecond precision is dropped: 150.9ms is recorded as 150.
pub(crate) fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Full metric name: `[{prefix}.]{namespace}.{metric}`.
pub fn metric_name(prefix: &str, direction: Direction, metric: &str) -> String {
    if prefix.is_empty() {
        format!("{}.{metric}", direction.namespace())
    } else {
        format!("{prefix}.{}.{metric}", direction.namespace())
    }
}

struct Instruments<'a> {
    meter: &'a Meter,
    direction: Direction,
    prefix: &'a str,
}

impl<'a> Instruments<'a> {
    fn new(meter: &'a Meter, direction: Direction, prefix: &'a str) -> Self {
        Self {
            meter,
            direction,
            prefix,
        }
    }

    fn name(&self, metric: &str) -> String {
        metric_name(self.prefix, self.direction, metric)
    }

    fn requests(&self) -> Result<UpDownCounter<i64>, HttpMetricsError> {
        let name = self.name(REQUEST_COUNT);

        self.meter
            .i64_up_down_counter(name.clone())
            .with_description("Number of Requests")
            .with_unit(Unit::new("1"))
            .try_init()
            .map_err(|source| HttpMetricsError::InstrumentCreation { name, source })
    }

    fn duration(&self) -> Result<Histogram<u64>, HttpMetricsError> {
        let name = self.name(DURATION);

        self.meter
            .u64_histogram(name.clone())
            .with_description("Time Taken by request")
            .with_unit(Unit::new("ms"))
            .try_init()
            .map_err(|source| HttpMetricsError::InstrumentCreation { name, source })
    }

    fn active_requests(&self) -> Result<UpDownCounter<i64>, HttpMetricsError> {
        let name = self.name(ACTIVE_REQUESTS);

        self.meter
            .i64_up_down_counter(name.clone())
            .with_description("Number of requests inflight")
            .with_unit(Unit::new("1"))
            .try_init()
            .map_err(|source| HttpMetricsError::InstrumentCreation { name, source })
    }

    fn request_size(&self) -> Result<Histogram<i64>, HttpMetricsError> {
        self.size_histogram(REQUEST_CONTENT_LENGTH, "Request Size")
    }

    fn response_size(&self) -> Result<Histogram<i64>, HttpMetricsError> {
        self.size_histogram(RESPONSE_CONTENT_LENGTH, "Response Size")
    }

    fn size_histogram(&self, metric: &str, description: &'static str) -> Result<Histogram<i64>, HttpMetricsError> {
        let name = self.name(metric);

        self.meter
            .i64_histogram(name.clone())
            .with_description(description)
            .with_unit(Unit::new("By"))
            .try_init()
            .map_err(|source| HttpMetricsError::InstrumentCreation { name, source })
    }
}

trait NoopInstrument {
    fn noop() -> Self;
}

impl NoopInstrument for UpDownCounter<i64> {
    fn noop() -> Self {
        UpDownCounter::new(Arc::new(NoopSyncInstrument::new()))
    }
}

impl NoopInstrument for Histogram<u64> {
    fn noop() -> Self {
        Histogram::new(Arc::new(NoopSyncInstrument::new()))
    }
}

impl NoopInstrument for Histogram<i64> {
    fn noop() -> Self {
        Histogram::new(Arc::new(NoopSyncInstrument::new()))
    }
}

fn or_noop<T: NoopInstrument>(instrument: Result<T, HttpMetricsError>) -> T {
    instrument.unwrap_or_else(|error| {
        tracing::warn!("{error}, its measurements will be dropped");
        T::noop()
    })
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::{noop::NoopMeterProvider, MeterProvider};

    use super::*;

    #[test]
    fn names_without_prefix() {
        assert_eq!(
            metric_name("", Direction::Server, REQUEST_COUNT),
            "http.server.request_count"
        );
        assert_eq!(metric_name("", Direction::Client, DURATION), "http.client.duration");
    }

    #[test]
    fn names_with_prefix() {
        assert_eq!(
            metric_name("checkout", Direction::Client, RESPONSE_CONTENT_LENGTH),
            "checkout.http.client.response_content_length"
        );
        assert_eq!(
            metric_name("checkout", Direction::Server, ACTIVE_REQUESTS),
            "checkout.http.server.active_requests"
        );
    }

    #[test]
    fn durations_are_truncated_to_milliseconds() {
        assert_eq!(whole_millis(Duration::from_millis(150)), 150);
        assert_eq!(whole_millis(Duration::from_micros(150_900)), 150);
        assert_eq!(whole_millis(Duration::from_micros(999)), 0);
    }

    #[test]
    fn records_through_a_noop_meter() {
        let meter = NoopMeterProvider::new().meter("test");
        let recorder = OtelRecorder::try_new(&meter, Direction::Server, "").unwrap();
        let attributes = [KeyValue::new("http.method", "GET")];

        recorder.add_in_flight(1, &attributes);
        recorder.add_in_flight(-1, &attributes);
        recorder.add_requests(0, &attributes);
        recorder.record_duration(Duration::ZERO, &attributes);
        recorder.record_request_size(0, &attributes);
        recorder.record_response_size(-1, &attributes);
    }
}
