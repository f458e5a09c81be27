#![allow(unused_crate_dependencies)]

use std::convert::Infallible;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use http_metrics::{
    client::ClientMetrics, recorder::otel::OtelRecorder, server::ServerMetricsLayer, Direction, MetricsOption,
};
use opentelemetry_sdk::{
    metrics::{
        data::{Histogram, ResourceMetrics, Sum},
        PeriodicReader, SdkMeterProvider,
    },
    runtime,
    testing::metrics::InMemoryMetricsExporter,
};
use tower::{service_fn, Layer, ServiceExt};

fn provider() -> (SdkMeterProvider, InMemoryMetricsExporter) {
    let exporter = InMemoryMetricsExporter::default();
    let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio).build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();

    (provider, exporter)
}

async fn collect(provider: &SdkMeterProvider, exporter: &InMemoryMetricsExporter) -> Vec<ResourceMetrics> {
    let provider = provider.clone();
    tokio::task::spawn_blocking(move || provider.force_flush())
        .await
        .unwrap()
        .unwrap();

    exporter.get_finished_metrics().unwrap()
}

fn names(metrics: &[ResourceMetrics]) -> Vec<String> {
    let mut names = metrics
        .iter()
        .flat_map(|resource| resource.scope_metrics.iter())
        .flat_map(|scope| scope.metrics.iter())
        .map(|metric| metric.name.to_string())
        .collect::<Vec<_>>();

    names.sort();
    names.dedup();
    names
}

async fn ok(_: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::new(Full::new(Bytes::from_static(b"pong"))))
}

#[tokio::test(flavor = "multi_thread")]
async fn client_instruments_are_prefixed() {
    let (provider, exporter) = provider();
    let meter = http_metrics::meter(&provider);

    let client = ClientMetrics::new(service_fn(ok), &meter, [MetricsOption::metric_prefix("shop")]);
    client
        .oneshot(Request::get("https://payments.example.com/ping").body(Full::default()).unwrap())
        .await
        .unwrap();

    let metrics = collect(&provider, &exporter).await;

    assert_eq!(
        names(&metrics),
        [
            "shop.http.client.active_requests",
            "shop.http.client.duration",
            "shop.http.client.request_content_length",
            "shop.http.client.request_count",
            "shop.http.client.response_content_length",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn server_instruments_hold_the_measurements() {
    let (provider, exporter) = provider();
    let meter = http_metrics::meter(&provider);

    let service = ServerMetricsLayer::new(&meter, []).layer(service_fn(ok));

    for _ in 0..3 {
        service
            .clone()
            .oneshot(Request::get("/ping").body(Full::default()).unwrap())
            .await
            .unwrap();
    }

    let metrics = collect(&provider, &exporter).await;
    let metrics = metrics
        .iter()
        .flat_map(|resource| resource.scope_metrics.iter())
        .flat_map(|scope| scope.metrics.iter())
        .collect::<Vec<_>>();

    let sum = |name: &str| -> i64 {
        metrics
            .iter()
            .filter(|metric| metric.name == name)
            .filter_map(|metric| metric.data.as_any().downcast_ref::<Sum<i64>>())
            .flat_map(|sum| sum.data_points.iter())
            .map(|point| point.value)
            .sum()
    };

    assert_eq!(sum("http.server.request_count"), 3);
    assert_eq!(sum("http.server.active_requests"), 0);

    let response_sizes = metrics
        .iter()
        .filter(|metric| metric.name == "http.server.response_content_length")
        .filter_map(|metric| metric.data.as_any().downcast_ref::<Histogram<i64>>())
        .flat_map(|histogram| histogram.data_points.iter())
        .map(|point| (point.count, point.sum))
        .collect::<Vec<_>>();

    assert_eq!(response_sizes, [(3, 12)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn strict_recorder_creation() {
    let (provider, _exporter) = provider();
    let meter = http_metrics::meter(&provider);

    assert!(OtelRecorder::try_new(&meter, Direction::Server, "").is_ok());
}
