use std::{sync::Arc, time::Instant};

use http::{Request, Response};
use http_body::Body;
use opentelemetry::KeyValue;

use crate::{
    attributes::{status_attributes, Exchange},
    config::Config,
    size,
};

/// Measurements of a single exchange, from the moment its request is dispatched until its response
/// is available.
///
/// The in-flight count incremented by [Measurement::start] is decremented exactly once: when the
/// exchange completes, fails, or when the measurement is dropped because the exchange was
/// cancelled.
pub(crate) struct Measurement {
    config: Arc<Config>,
    attributes: Vec<KeyValue>,
    in_flight: bool,
    request_size: Option<i64>,
    start: Instant,
}

impl Measurement {
    /// Returns `None` if the exchange must not be measured at all.
    pub(crate) fn start<B: Body>(config: &Arc<Config>, request: &Request<B>) -> Option<Self> {
        let exchange = Exchange::from_request(config.direction(), request, config.server_name());

        if !config.should_record(&exchange) {
            tracing::debug!(path = exchange.path(), "skipping request metrics");
            return None;
        }

        let attributes = config.attributes(&exchange);

        // The request is handed over to the inner service, its size must be taken now.
        let request_size = config
            .record_size()
            .then(|| size::approximate_request_size(request));

        let in_flight = config.record_in_flight();
        if in_flight {
            config.recorder().add_in_flight(1, &attributes);
        }

        Some(Self {
            config: Arc::clone(config),
            attributes,
            in_flight,
            request_size,
            start: Instant::now(),
        })
    }

    /// The exchange completed with a response.
    pub(crate) fn finish<B: Body>(mut self, response: &Response<B>) {
        let elapsed = self.start.elapsed();
        self.release_in_flight();

        let config = &self.config;
        let recorder = config.recorder();

        let mut attributes = self.attributes.clone();
        attributes.extend(status_attributes(response.status(), config.grouped_status()));

        recorder.add_requests(1, &attributes);

        if let Some(request_size) = self.request_size {
            recorder.record_request_size(request_size, &attributes);
            recorder.record_response_size(size::response_content_length(response), &attributes);
        }

        if config.record_duration() {
            recorder.record_duration(elapsed, &attributes);
        }

        tracing::trace!(
            status = response.status().as_u16(),
            elapsed = ?elapsed,
            "request metrics recorded"
        );
    }

    /// The exchange failed without a response. Only the in-flight count is updated.
    pub(crate) fn fail(mut self) {
        self.release_in_flight();
        tracing::trace!("request failed, only in-flight metrics recorded");
    }

    fn release_in_flight(&mut self) {
        if std::mem::take(&mut self.in_flight) {
            self.config.recorder().add_in_flight(-1, &self.attributes);
        }
    }
}

impl Drop for Measurement {
    fn drop(&mut self) {
        self.release_in_flight();
    }
}
