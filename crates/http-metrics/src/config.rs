use std::{fmt, sync::Arc};

use http_metrics_config::HttpMetricsConfig;
use opentelemetry::{metrics::Meter, Key, KeyValue, Value};

use crate::{
    attributes::{self, AttributeDeriver, Exchange},
    recorder::{otel::OtelRecorder, Recorder},
};

/// Which side of the exchange is being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A request handled by this process.
    Server,
    /// A request sent by this process.
    Client,
}

impl Direction {
    /// Namespace of the instrument names, `http.server` or `http.client`.
    pub fn namespace(self) -> &'static str {
        match self {
            Direction::Server => "http.server",
            Direction::Client => "http.client",
        }
    }
}

/// Decides whether an exchange is measured at all.
pub type ShouldRecord = Arc<dyn Fn(&Exchange<'_>) -> bool + Send + Sync>;

/// In-progress configuration, modified by each [`MetricsOption`] in turn.
pub struct ConfigBuilder {
    record_in_flight: bool,
    record_duration: bool,
    record_size: bool,
    grouped_status: bool,
    attributes: AttributeDeriver,
    should_record: ShouldRecord,
    recorder: Option<Arc<dyn Recorder>>,
    metric_prefix: String,
    server_name: Option<String>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            record_in_flight: true,
            record_duration: true,
            record_size: true,
            grouped_status: true,
            attributes: Arc::new(attributes::default_attributes),
            should_record: Arc::new(|_: &Exchange<'_>| true),
            recorder: None,
            metric_prefix: String::new(),
            server_name: None,
        }
    }
}

impl ConfigBuilder {
    /// Applies the options in order. An option touching a field already set by a previous one
    /// overrides it.
    pub fn apply(mut self, options: impl IntoIterator<Item = MetricsOption>) -> Self {
        for option in options {
            (option.0)(&mut self);
        }

        self
    }

    /// Freezes the configuration. Without a custom recorder, the default one is registered with
    /// the given meter.
    pub fn finish(self, direction: Direction, meter: &Meter) -> Config {
        let recorder = match self.recorder {
            Some(recorder) => recorder,
            None => Arc::new(OtelRecorder::new(meter, direction, &self.metric_prefix)),
        };

        Config {
            direction,
            record_in_flight: self.record_in_flight,
            record_duration: self.record_duration,
            record_size: self.record_size,
            grouped_status: self.grouped_status,
            attributes: self.attributes,
            should_record: self.should_record,
            recorder,
            server_name: self.server_name,
        }
    }
}

/// One override operation on the default configuration.
pub struct MetricsOption(Box<dyn FnOnce(&mut ConfigBuilder) + Send>);

impl MetricsOption {
    fn new(apply: impl FnOnce(&mut ConfigBuilder) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    /// Stops tracking the requests in flight.
    pub fn disable_in_flight() -> Self {
        Self::new(|builder| builder.record_in_flight = false)
    }

    /// Stops measuring the request duration.
    pub fn disable_duration() -> Self {
        Self::new(|builder| builder.record_duration = false)
    }

    /// Stops measuring request and response sizes.
    pub fn disable_size() -> Self {
        Self::new(|builder| builder.record_size = false)
    }

    /// Records the exact status code instead of its class.
    pub fn disable_grouped_status() -> Self {
        Self::new(|builder| builder.grouped_status = false)
    }

    /// Replaces the attribute deriver.
    pub fn attributes<F>(deriver: F) -> Self
    where
        F: Fn(&Exchange<'_>) -> Vec<KeyValue> + Send + Sync + 'static,
    {
        Self::new(move |builder| builder.attributes = Arc::new(deriver))
    }

    /// Uses a fixed set of attributes for every exchange, replacing the derived ones.
    pub fn static_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let attributes = attributes::static_set(attributes);

        Self::new(move |builder| builder.attributes = Arc::new(move |_: &Exchange<'_>| attributes.clone()))
    }

    /// Appends a fixed set of attributes to the ones derived by the current deriver. A key already
    /// derived is replaced.
    pub fn additional_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let additional = attributes::static_set(attributes);

        Self::new(move |builder| {
            let base = Arc::clone(&builder.attributes);

            builder.attributes = Arc::new(move |exchange: &Exchange<'_>| {
                let mut attributes = base(exchange);
                attributes.retain(|kv| !additional.iter().any(|extra| extra.key == kv.key));
                attributes.extend(additional.iter().cloned());
                attributes
            });
        })
    }

    /// Sends measurements to this recorder instead of the default one.
    pub fn recorder(recorder: impl Recorder) -> Self {
        let recorder: Arc<dyn Recorder> = Arc::new(recorder);
        Self::new(move |builder| builder.recorder = Some(recorder))
    }

    /// Exchanges for which the predicate is false are passed through without any measurement.
    pub fn should_record<F>(predicate: F) -> Self
    where
        F: Fn(&Exchange<'_>) -> bool + Send + Sync + 'static,
    {
        Self::new(move |builder| builder.should_record = Arc::new(predicate))
    }

    /// Prefix of the default recorder's metric names: `{prefix}.http.server.duration`.
    pub fn metric_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |builder| builder.metric_prefix = prefix)
    }

    /// Value of the `http.server_name` attribute of incoming requests.
    pub fn server_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |builder| builder.server_name = Some(name))
    }

    /// The options equivalent to the given settings, in the order they must be applied.
    pub fn from_settings(settings: &HttpMetricsConfig) -> Vec<Self> {
        let mut options = Vec::new();

        if !settings.record_in_flight {
            options.push(Self::disable_in_flight());
        }

        if !settings.record_duration {
            options.push(Self::disable_duration());
        }

        if !settings.record_size {
            options.push(Self::disable_size());
        }

        if !settings.grouped_status {
            options.push(Self::disable_grouped_status());
        }

        if let Some(prefix) = &settings.metric_prefix {
            options.push(Self::metric_prefix(prefix.clone()));
        }

        if let Some(name) = &settings.server_name {
            options.push(Self::server_name(name.clone()));
        }

        if let Some(attributes) = &settings.static_attributes {
            options.push(Self::static_attributes(attributes.clone()));
        }

        if !settings.additional_attributes.is_empty() {
            options.push(Self::additional_attributes(settings.additional_attributes.clone()));
        }

        if !settings.skip_paths.is_empty() {
            let settings = settings.clone();
            options.push(Self::should_record(move |exchange| settings.records_path(exchange.path())));
        }

        options
    }
}

impl fmt::Debug for MetricsOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsOption").finish_non_exhaustive()
    }
}

/// What gets measured for each exchange, and where it's recorded. Immutable once built and shared
/// by every exchange going through the same middleware.
#[derive(Clone)]
pub struct Config {
    direction: Direction,
    record_in_flight: bool,
    record_duration: bool,
    record_size: bool,
    grouped_status: bool,
    attributes: AttributeDeriver,
    should_record: ShouldRecord,
    recorder: Arc<dyn Recorder>,
    server_name: Option<String>,
}

impl Config {
    /// Builds the configuration from the defaults and the options, applied in order.
    pub fn build(direction: Direction, meter: &Meter, options: impl IntoIterator<Item = MetricsOption>) -> Self {
        ConfigBuilder::default().apply(options).finish(direction, meter)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn record_in_flight(&self) -> bool {
        self.record_in_flight
    }

    pub fn record_duration(&self) -> bool {
        self.record_duration
    }

    pub fn record_size(&self) -> bool {
        self.record_size
    }

    pub fn grouped_status(&self) -> bool {
        self.grouped_status
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn recorder(&self) -> &dyn Recorder {
        self.recorder.as_ref()
    }

    pub fn should_record(&self, exchange: &Exchange<'_>) -> bool {
        (self.should_record)(exchange)
    }

    pub fn attributes(&self, exchange: &Exchange<'_>) -> Vec<KeyValue> {
        (self.attributes)(exchange)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("direction", &self.direction)
            .field("record_in_flight", &self.record_in_flight)
            .field("record_duration", &self.record_duration)
            .field("record_size", &self.record_size)
            .field("grouped_status", &self.grouped_status)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}
