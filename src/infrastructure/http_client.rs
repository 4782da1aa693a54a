use crate::application::services::HttpClient;
use crate::domain::entities::{Request, Response};
use crate::domain::value_objects::{HeaderList, JsonBody};

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, HOST};
use hyper::http::uri::Scheme;
use hyper::{Request as HyperRequest, Uri};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;

/// Infrastructure implementation of HttpClient using Hyper
///
/// Opens one HTTP/1.1 connection per request, over TLS for `https` URLs.
/// Records are sent strictly one after another, so there is no pool.
pub struct HyperHttpClient {
    tls: tokio_native_tls::TlsConnector,
    timeout: Option<Duration>,
}

impl HyperHttpClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let tls = native_tls::TlsConnector::new().context("initializing TLS")?;
        Ok(Self {
            tls: tokio_native_tls::TlsConnector::from(tls),
            timeout,
        })
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn send(&self, request: Request) -> Result<Response> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(request))
                .await
                .map_err(|_| anyhow!("request timed out after {limit:?}"))?,
            None => self.execute(request).await,
        }
    }
}

impl HyperHttpClient {
    async fn execute(&self, request: Request) -> Result<Response> {
        let uri = request.url.uri().clone();
        let hyper_request = RequestAdapter::to_hyper_request(request)?;
        let hyper_response = self.execute_http_request(&uri, hyper_request).await?;
        ResponseAdapter::to_domain_response(hyper_response).await
    }

    async fn execute_http_request(
        &self,
        uri: &Uri,
        request: HyperRequest<Full<Bytes>>,
    ) -> Result<hyper::Response<Incoming>> {
        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .ok_or_else(|| anyhow!("URL {uri} has no host"))?;
        let https = uri.scheme() == Some(&Scheme::HTTPS);
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });

        let tcp = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to {host}:{port}"))?;

        if https {
            let tls = self
                .tls
                .connect(host, tcp)
                .await
                .with_context(|| format!("TLS handshake with {host}"))?;
            Self::dispatch(tls, request).await
        } else {
            Self::dispatch(tcp, request).await
        }
    }

    async fn dispatch<T>(
        stream: T,
        request: HyperRequest<Full<Bytes>>,
    ) -> Result<hyper::Response<Incoming>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(|e| anyhow!("HTTP handshake failed: {}", e))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!("connection closed with error: {err}");
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(|e| anyhow!("HTTP request execution failed: {}", e))
    }
}

/// Adapter for converting domain requests to Hyper requests
struct RequestAdapter;

impl RequestAdapter {
    fn to_hyper_request(domain_request: Request) -> Result<HyperRequest<Full<Bytes>>> {
        let uri = UriAdapter::to_origin_form(domain_request.url.uri())?;
        let body = BodyAdapter::to_hyper_body(&domain_request.body);

        let mut builder = HyperRequest::builder()
            .method(domain_request.method)
            .uri(uri);

        builder = HeaderAdapter::add_host(builder, domain_request.url.uri(), &domain_request.headers)?;
        builder = HeaderAdapter::add_headers(builder, &domain_request.headers);

        builder
            .body(body)
            .map_err(|e| anyhow!("Failed to build HTTP request: {}", e))
    }
}

/// Adapter for converting domain responses from Hyper responses
struct ResponseAdapter;

impl ResponseAdapter {
    async fn to_domain_response(hyper_response: hyper::Response<Incoming>) -> Result<Response> {
        let status = hyper_response.status();
        let body = Self::extract_response_body(hyper_response).await?;

        Ok(Response { status, body })
    }

    async fn extract_response_body(response: hyper::Response<Incoming>) -> Result<String> {
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?
            .to_bytes();

        Ok(String::from_utf8_lossy(&body_bytes).into_owned())
    }
}

/// Adapter for converting domain URLs to the request-line form
struct UriAdapter;

impl UriAdapter {
    fn to_origin_form(domain_url: &Uri) -> Result<Uri> {
        let path = match domain_url.query() {
            Some(query) => format!("{}?{}", domain_url.path(), query),
            None => domain_url.path().to_string(),
        };
        path.parse::<Uri>()
            .map_err(|e| anyhow!("Invalid request path {path:?}: {}", e))
    }
}

/// Adapter for converting domain request bodies to Hyper bodies
struct BodyAdapter;

impl BodyAdapter {
    fn to_hyper_body(domain_body: &JsonBody) -> Full<Bytes> {
        Full::new(Bytes::from(domain_body.0.clone()))
    }
}

/// Adapter for handling HTTP headers
struct HeaderAdapter;

impl HeaderAdapter {
    fn add_host(
        builder: http::request::Builder,
        url: &Uri,
        headers: &HeaderList,
    ) -> Result<http::request::Builder> {
        if headers.contains("Host") {
            return Ok(builder);
        }
        let host = url.host().ok_or_else(|| anyhow!("URL {url} has no host"))?;
        let host = match url.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let value = HeaderValue::from_str(&host)
            .map_err(|e| anyhow!("Invalid host {host}: {}", e))?;
        Ok(builder.header(HOST, value))
    }

    fn add_headers(
        mut builder: http::request::Builder,
        headers: &HeaderList,
    ) -> http::request::Builder {
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        builder
    }
}
