//! Request execution: one exchange in, one settled result out.
//!
//! # Design
//! Both paths check the target URL, wrap the whole exchange (send plus body)
//! in the caller's timeout, and resolve the status message the same way. The
//! buffered path parses the body as JSON; the streaming path copies it into
//! a sink and returns `data: null`. On timeout the exchange future is
//! dropped, which aborts the underlying request.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::{check_target, redact};
use crate::envelope::{header_map, Envelope};
use crate::error::CouchError;
use crate::http::{ByteStream, HttpRequest};
use crate::status::{self, StatusTable};
use crate::transport::Transport;

/// Send `request`, buffer the body and parse it as JSON.
pub async fn execute(
    transport: &dyn Transport,
    request: HttpRequest,
    statuses: &StatusTable,
    timeout: Duration,
) -> Result<Envelope, CouchError> {
    check_target(&request.url).map_err(CouchError::BadTarget)?;
    let method = request.method;
    let url = redact(&request.url);
    debug!(%method, %url, "sending request");

    let started = Instant::now();
    let exchange = async {
        let response = transport.send(request).await?;
        let body = read_body(response.body).await?;
        Ok::<_, CouchError>((response.status, response.headers, body))
    };
    let (status, headers, body) = within(timeout, exchange)
        .await
        .inspect_err(|e| warn!(%method, %url, error = %e, "request failed"))?;

    let headers = header_map(headers);
    let data = parse_body(&body).map_err(|source| CouchError::Parse {
        status,
        headers: headers.clone(),
        source,
    })?;
    let elapsed = started.elapsed();
    debug!(%method, %url, status, elapsed_ms = elapsed.as_millis() as u64, "response received");

    settle(Envelope {
        headers,
        data,
        status,
        message: status::resolve(status, statuses).to_string(),
        duration: Some(elapsed),
    })
}

/// Send `request` and copy the response body into `sink` as it arrives.
///
/// The sink receives the body even when the status is an error.
pub async fn execute_to_sink<W>(
    transport: &dyn Transport,
    request: HttpRequest,
    statuses: &StatusTable,
    timeout: Duration,
    sink: &mut W,
) -> Result<Envelope, CouchError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    check_target(&request.url).map_err(CouchError::BadTarget)?;
    let method = request.method;
    let url = redact(&request.url);
    debug!(%method, %url, "sending streaming request");

    let started = Instant::now();
    let exchange = async {
        let response = transport.send(request).await?;
        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CouchError::Transport(e.to_string()))?;
            sink.write_all(&chunk).await.map_err(CouchError::Sink)?;
            written += chunk.len() as u64;
        }
        sink.flush().await.map_err(CouchError::Sink)?;
        Ok::<_, CouchError>((response.status, response.headers, written))
    };
    let (status, headers, written) = within(timeout, exchange)
        .await
        .inspect_err(|e| warn!(%method, %url, error = %e, "streaming request failed"))?;

    let elapsed = started.elapsed();
    debug!(%method, %url, status, written, elapsed_ms = elapsed.as_millis() as u64, "response streamed");

    settle(Envelope {
        headers: header_map(headers),
        data: Value::Null,
        status,
        message: status::resolve(status, statuses).to_string(),
        duration: Some(elapsed),
    })
}

async fn within<T, F>(timeout: Duration, exchange: F) -> Result<T, CouchError>
where
    F: Future<Output = Result<T, CouchError>>,
{
    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(CouchError::Timeout(timeout)),
    }
}

async fn read_body(mut body: ByteStream) -> Result<Vec<u8>, CouchError> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CouchError::Transport(e.to_string()))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// An empty (or all-whitespace) body reads as `{}`.
fn parse_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
}

fn settle(envelope: Envelope) -> Result<Envelope, CouchError> {
    if envelope.is_success() {
        Ok(envelope)
    } else {
        Err(CouchError::Status(Box::new(envelope)))
    }
}
