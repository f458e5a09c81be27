use http::{header::CONTENT_LENGTH, HeaderMap, Request, Response, Version};
use http_body::Body;

/// Size reported when the length of a body is not known, e.g. a streamed body.
pub const UNKNOWN_CONTENT_LENGTH: i64 = -1;

/// Approximate size of a request on the wire, in bytes.
///
/// This is an estimation, not the actual number of bytes sent or received: it adds up the path,
/// method, protocol, every header name, every header value, the host of the URI and the declared
/// body length. Framing, compression and chunked encoding are ignored. When the URI has no host,
/// the `Host` header is counted with the other headers.
pub fn approximate_request_size<B: Body>(request: &Request<B>) -> i64 {
    let mut size = request.uri().path().len();

    size += request.method().as_str().len();
    size += protocol(request.version()).len();

    size += request.headers().keys().map(|name| name.as_str().len()).sum::<usize>();
    size += request.headers().values().map(|value| value.len()).sum::<usize>();

    size += request.uri().host().map_or(0, str::len);

    let size = i64::try_from(size).unwrap_or(i64::MAX);

    match declared_content_length(request) {
        Some(length) => size.saturating_add(i64::try_from(length).unwrap_or(i64::MAX)),
        None => size,
    }
}

/// Body length known before reading it: the exact size hint of the body, or the `Content-Length`
/// header.
pub fn declared_content_length<B: Body>(request: &Request<B>) -> Option<u64> {
    declared_length(request.body(), request.headers())
}

/// Body length of a response, known the same way as [declared_content_length], or
/// [UNKNOWN_CONTENT_LENGTH].
pub fn response_content_length<B: Body>(response: &Response<B>) -> i64 {
    declared_length(response.body(), response.headers())
        .map_or(UNKNOWN_CONTENT_LENGTH, |length| i64::try_from(length).unwrap_or(i64::MAX))
}

fn declared_length<B: Body>(body: &B, headers: &HeaderMap) -> Option<u64> {
    body.size_hint().exact().or_else(|| {
        headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    })
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "",
    }
}
