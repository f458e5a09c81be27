use std::{
    future::Future,
    pin::Pin,
    task::{ready, Context, Poll},
};

use http::Response;
use http_body::Body;
use pin_project_lite::pin_project;

use crate::exchange::Measurement;

pin_project! {
    /// Response future of the metrics services. Resolves to the inner service's result, untouched.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        measurement: Option<Measurement>,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(inner: F, measurement: Option<Measurement>) -> Self {
        Self { inner, measurement }
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: Body,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        if let Some(measurement) = this.measurement.take() {
            match result {
                Ok(ref response) => measurement.finish(response),
                Err(_) => measurement.fail(),
            }
        }

        Poll::Ready(result)
    }
}
