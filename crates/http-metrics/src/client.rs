//! Metrics of the requests sent through an outbound transport.
//!
//! Any [Service] taking an [http::Request] and returning an [http::Response] can be decorated,
//! e.g. hyper's client. Transport errors are returned to the caller as-is; for those only the
//! in-flight count is updated.

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

#[derive(Clone, Debug)]
pub struct ClientMetricsLayer {
    config: Arc<Config>,
}

impl ClientMetricsLayer {
    pub fn new(meter: &Meter, options: impl IntoIterator<Item = MetricsOption>) -> Self {
        Self::from_config(Config::build(Direction::Client, meter, options))
    }

    /// The configuration must have been built for [Direction::Client].
    pub fn from_config(config: Config) -> Self {
        debug_assert_eq!(config.direction(), Direction::Client);

        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for ClientMetricsLayer {
    type Service = ClientMetrics<S>;

    fn layer(&self, transport: S) -> Self::Service {
        ClientMetrics {
            transport,
            config: Arc::clone(&self.config),
        }
    }
}

/// Transport decorator measuring every request sent through `S`.
#[derive(Clone, Debug)]
pub struct ClientMetrics<S> {
    transport: S,
    config: Arc<Config>,
}

impl<S> ClientMetrics<S> {
    pub fn new(transport: S, meter: &Meter, options: impl IntoIterator<Item = MetricsOption>) -> Self {
        ClientMetricsLayer::new(meter, options).layer(transport)
    }

    pub fn get_ref(&self) -> &S {
        &self.transport
    }

    pub fn into_inner(self) -> S {
        self.transport
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ClientMetrics<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ReqBody: Body,
    ResBody: Body,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let measurement = Measurement::start(&self.config, &request);

        ResponseFuture::new(self.transport.call(request), measurement)
    }
}
