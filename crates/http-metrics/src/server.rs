//! Metrics of the requests handled by a server.
//!
//! With axum, install the layer with `Router::route_layer` so that the route template is known
//! when the request reaches it:
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use http_metrics::{meter, server::ServerMetricsLayer, MetricsOption};
//! use opentelemetry::metrics::noop::NoopMeterProvider;
//!
//! let meter = meter(&NoopMeterProvider::new());
//!
//! let app: Router = Router::new()
//!     .route("/users/:id", get(|| async { "user" }))
//!     .route_layer(ServerMetricsLayer::new(&meter, [MetricsOption::server_name("users")]));
//! ```

use std::{
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response};
use http_body::Body;
use opentelemetry::metrics::Meter;
use tower::{Layer, Service};

use crate::{
    config::{Config, Direction, MetricsOption},
    exchange::Measurement,
    future::ResponseFuture,
};

/// [Layer] measuring every request going through the services it wraps.
#[derive(Clone, Debug)]
pub struct ServerMetricsLayer {
    config: Arc<Config>,
}

impl ServerMetricsLayer {
    pub fn new(meter: &Meter, options: impl IntoIterator<Item = MetricsOption>) -> Self {
        Self::from_config(Config::build(Direction::Server, meter, options))
    }

    /// The configuration must have been built for [Direction::Server].
    pub fn from_config(config: Config) -> Self {
        debug_assert_eq!(config.direction(), Direction::Server);

        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for ServerMetricsLayer {
    type Service = ServerMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerMetrics {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Middleware measuring the requests handled by `S`. See [ServerMetricsLayer].
#[derive(Clone, Debug)]
pub struct ServerMetrics<S> {
    inner: S,
    config: Arc<Config>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ServerMetrics<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ReqBody: Body,
    ResBody: Body,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let measurement = Measurement::start(&self.config, &request);

        ResponseFuture::new(self.inner.call(request), measurement)
    }
}
