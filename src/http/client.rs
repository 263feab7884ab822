use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Request};
use tracing::error;

use crate::args::{DEFAULT_USER_AGENT, HttpMethod};
use crate::config::{RequestBody, TestConfiguration};
use crate::error::HttpError;
use crate::metrics::ErrorKind;

/// What the executor needs to know about a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub body_bytes: u64,
}

/// Performs one request on behalf of the executor.
///
/// Implementations report transport failures as an [`ErrorKind`]; they never
/// panic on network errors.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, index: u64) -> Result<ResponseSummary, ErrorKind>;
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// reqwest-backed sender sharing one connection pool across all requests.
#[derive(Debug)]
pub struct HttpSender {
    client: Client,
    template: Request,
}

impl HttpSender {
    /// Builds the shared client and the request every dispatch clones.
    ///
    /// # Errors
    ///
    /// Returns an error when the client or the request template cannot be
    /// built.
    pub fn new(config: &TestConfiguration) -> Result<Self, HttpError> {
        let client = match Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(config.concurrency())
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                error!("Failed to build HTTP client: {}", err);
                return Err(HttpError::BuildClientFailed { source: err });
            }
        };

        let mut request_builder =
            client.request(config.method().into(), config.url().clone());
        for (key, value) in config.headers() {
            request_builder = request_builder.header(key, value);
        }
        request_builder = match config.body() {
            Some(RequestBody::Json(value)) => request_builder.json(value),
            Some(RequestBody::Raw(bytes)) => request_builder.body(bytes.clone()),
            None => request_builder,
        };

        let template = match request_builder.build() {
            Ok(request) => request,
            Err(err) => {
                error!("Failed to build request: {}", err);
                return Err(HttpError::BuildRequestFailed { source: err });
            }
        };
        if template.try_clone().is_none() {
            return Err(HttpError::RequestNotCloneable);
        }

        Ok(Self { client, template })
    }
}

#[async_trait]
impl RequestSender for HttpSender {
    async fn send(&self, _index: u64) -> Result<ResponseSummary, ErrorKind> {
        let request = self.template.try_clone().ok_or(ErrorKind::Unknown)?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| classify_error(&err))?;
        let status = response.status().as_u16();
        let body_bytes = drain_response_body(response)
            .await
            .map_err(|err| classify_error(&err))?;
        Ok(ResponseSummary { status, body_bytes })
    }
}

/// Maps a reqwest failure onto the reported error kinds.
#[must_use]
pub fn classify_error(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::ConnectionError
    } else if err.is_body() || err.is_decode() || err.is_redirect() || err.is_status() {
        ErrorKind::ProtocolError
    } else if err.is_request() {
        if has_io_source(err) {
            ErrorKind::ConnectionError
        } else {
            // The connection was up but the peer's bytes did not parse as HTTP.
            ErrorKind::ProtocolError
        }
    } else {
        ErrorKind::Unknown
    }
}

fn has_io_source(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if inner.is::<std::io::Error>() {
            return true;
        }
        source = std::error::Error::source(inner);
    }
    false
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
