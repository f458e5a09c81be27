use std::{borrow::Cow, sync::Arc};

use axum::extract::MatchedPath;
use http::{header::HOST, Extensions, HeaderMap, Method, Request, StatusCode, Uri, Version};
use opentelemetry::KeyValue;

use crate::config::Direction;

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_HOST: &str = "http.host";
pub const HTTP_TARGET: &str = "http.target";
pub const HTTP_SERVER_NAME: &str = "http.server_name";
pub const HTTP_ROUTE: &str = "http.route";
pub const HTTP_STATUS_CODE: &str = "http.status_code";

/// Produces the attributes attached to every measurement of an exchange. Must not have side
/// effects, it runs once per exchange whatever is being measured.
pub type AttributeDeriver = Arc<dyn Fn(&Exchange<'_>) -> Vec<KeyValue> + Send + Sync>;

/// Route template of an incoming request, e.g. `/users/:id`.
///
/// Axum's [`MatchedPath`] is used when present. Other routers can insert this extension into the
/// request before the metrics middleware runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate(pub Cow<'static, str>);

impl RouteTemplate {
    pub fn new(template: impl Into<Cow<'static, str>>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read-only view of the request of an exchange, given to attribute derivers and to the
/// `should_record` predicate.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    direction: Direction,
    method: &'a Method,
    uri: &'a Uri,
    version: Version,
    headers: &'a HeaderMap,
    extensions: &'a Extensions,
    server_name: Option<&'a str>,
}

impl<'a> Exchange<'a> {
    pub fn from_request<B>(direction: Direction, request: &'a Request<B>, server_name: Option<&'a str>) -> Self {
        Exchange {
            direction,
            method: request.method(),
            uri: request.uri(),
            version: request.version(),
            headers: request.headers(),
            extensions: request.extensions(),
            server_name,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn uri(&self) -> &'a Uri {
        self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    pub fn extensions(&self) -> &'a Extensions {
        self.extensions
    }

    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    /// Host of the request: an explicit `Host` header overrides the host of the URI.
    pub fn host(&self) -> Option<&'a str> {
        self.headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty())
            .or_else(|| self.uri.host())
            .filter(|host| !host.is_empty())
    }

    /// Name of the server handling the request, if one was configured.
    pub fn server_name(&self) -> Option<&'a str> {
        self.server_name.filter(|name| !name.is_empty())
    }

    /// Route template the request matched, once routing happened.
    pub fn route(&self) -> Option<&'a str> {
        self.extensions
            .get::<MatchedPath>()
            .map(|path| path.as_str())
            .or_else(|| self.extensions.get::<RouteTemplate>().map(RouteTemplate::as_str))
    }
}

/// Default attributes, depending on the direction of the exchange.
pub fn default_attributes(exchange: &Exchange<'_>) -> Vec<KeyValue> {
    match exchange.direction() {
        Direction::Server => server_attributes(exchange),
        Direction::Client => client_attributes(exchange),
    }
}

/// Method, server name and route.
pub fn server_attributes(exchange: &Exchange<'_>) -> Vec<KeyValue> {
    let mut attributes = vec![method(exchange)];

    if let Some(server_name) = exchange.server_name() {
        attributes.push(KeyValue::new(HTTP_SERVER_NAME, server_name.to_string()));
    }

    if let Some(route) = exchange.route() {
        attributes.push(KeyValue::new(HTTP_ROUTE, route.to_string()));
    }

    attributes
}

/// Method, host and path.
pub fn client_attributes(exchange: &Exchange<'_>) -> Vec<KeyValue> {
    let mut attributes = vec![method(exchange)];

    if let Some(host) = exchange.host() {
        attributes.push(KeyValue::new(HTTP_HOST, host.to_string()));
    }

    let path = exchange.path();
    if !path.is_empty() {
        attributes.push(KeyValue::new(HTTP_TARGET, path.to_string()));
    }

    attributes
}

fn method(exchange: &Exchange<'_>) -> KeyValue {
    KeyValue::new(HTTP_METHOD, exchange.method().as_str().to_string())
}

/// Status attributes of a response. Grouping keeps the class only: 201 becomes 200, 404 becomes
/// 400.
pub fn status_attributes(status: StatusCode, grouped: bool) -> Vec<KeyValue> {
    let code = i64::from(status.as_u16());
    let code = if grouped { code / 100 * 100 } else { code };

    vec![KeyValue::new(HTTP_STATUS_CODE, code)]
}

/// Fixed attributes, sorted by key.
pub(crate) fn static_set<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Vec<KeyValue>
where
    K: Into<opentelemetry::Key>,
    V: Into<opentelemetry::Value>,
{
    let mut attributes = attributes
        .into_iter()
        .map(|(key, value)| KeyValue::new(key, value))
        .collect::<Vec<_>>();

    // Stable sort on the reversed input: the last value of a repeated key is kept.
    attributes.reverse();
    attributes.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
    attributes.dedup_by(|a, b| a.key == b.key);

    attributes
}
