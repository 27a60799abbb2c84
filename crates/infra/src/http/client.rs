use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use tollgate_common::error::TransportError;
use tracing::debug;
use url::Url;

use crate::errors::IntoTransportError;

/// One fully rendered HTTP request, ready to be sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Per-attempt deadline enforced by the transport, if any
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None, timeout: None }
    }
}

/// A response whose body has been read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }
}

/// Performs a single HTTP exchange. Never retries.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest { method, url, headers, body, timeout } = request;
        debug!(%method, %url, "sending HTTP request");

        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            err.into_transport()
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(IntoTransportError::into_transport)?;
        debug!(%method, %url, %status, bytes = body.len(), "received HTTP response");

        Ok(TransportResponse { status, headers, body: body.to_vec() })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    keepalive: bool,
    gzip: bool,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            keepalive: true,
            gzip: true,
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpTransportBuilder {
    /// Overall request deadline applied by reqwest.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuse pooled connections between requests.
    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    /// Advertise and transparently decode gzip responses.
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).gzip(self.gzip).no_proxy();

        if !self.keepalive {
            builder = builder.pool_max_idle_per_host(0);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(IntoTransportError::into_transport)?;

        Ok(HttpTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE};
    use tollgate_common::error::TransportErrorKind;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(method: Method, url: &str) -> TransportRequest {
        TransportRequest::new(method, Url::parse(url).expect("valid url"))
    }

    #[tokio::test]
    async fn sends_once_and_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().expect("transport");
        let response = transport
            .send(request(Method::GET, &format!("{}/pets", server.uri())))
            .await
            .expect("response");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, br#"{"items":[]}"#.to_vec());
    }

    #[tokio::test]
    async fn server_errors_are_responses_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().expect("transport");
        let response = transport.send(request(Method::GET, &server.uri())).await.expect("response");

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn forwards_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"name":"Rex"}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(Method::POST, &server.uri());
        req.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        req.body = Some(br#"{"name":"Rex"}"#.to_vec());

        let transport = HttpTransport::new().expect("transport");
        let response = transport.send(req).await.expect("response");
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn gzip_flag_controls_accept_encoding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let gzip = HttpTransport::builder().gzip(true).build().expect("transport");
        gzip.send(request(Method::GET, &server.uri())).await.expect("response");
        let plain = HttpTransport::builder().gzip(false).keepalive(false).build().expect("transport");
        plain.send(request(Method::GET, &server.uri())).await.expect("response");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let encoding = requests[0].headers.get(ACCEPT_ENCODING.as_str()).expect("header");
        assert!(encoding.to_str().unwrap().contains("gzip"));
        assert!(requests[1].headers.get(ACCEPT_ENCODING.as_str()).is_none());
    }

    #[tokio::test]
    async fn slow_response_is_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mut req = request(Method::GET, &server.uri());
        req.timeout = Some(Duration::from_millis(50));

        let transport = HttpTransport::new().expect("transport");
        let err = transport.send(req).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let transport = HttpTransport::new().expect("transport");
        let err = transport.send(request(Method::GET, &format!("http://{addr}"))).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Connect);
    }
}
