//! Pluggable HTTP transport.
//!
//! The executor hands a finished `HttpRequest` to a `Transport` and gets the
//! response back with its body still unread. `ReqwestTransport` is the
//! default; tests substitute their own to observe requests or simulate
//! failures without a server.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Method;

use crate::error::CouchError;
use crate::http::{HttpRequest, HttpResponse, RequestBody};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return once the response head has arrived.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CouchError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(verify_certificate: bool) -> Result<Self, CouchError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_certificate)
            .build()
            .map_err(|e| CouchError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CouchError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CouchError::BadTarget(e.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            // hyper frames streamed bodies itself
            if name.eq_ignore_ascii_case("transfer-encoding") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CouchError::Transport(error_chain(&e.without_url())))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes_stream().map_err(std::io::Error::other).boxed();

        Ok(HttpResponse { status, headers, body })
    }
}

/// `reqwest` puts the useful part (refused, DNS) in the source chain. The URL
/// is stripped by the caller since it may carry credentials.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
