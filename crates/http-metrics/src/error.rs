/// HTTP metrics errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMetricsError {
    /// The metrics backend refused to create an instrument
    #[error("unable to create instrument {name}: {source}")]
    InstrumentCreation {
        name: String,
        #[source]
        source: opentelemetry::metrics::MetricsError,
    },
}
