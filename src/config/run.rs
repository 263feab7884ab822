use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use url::{Host, Url};

use crate::args::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpMethod, Pacing,
    PositiveU64, PositiveUsize, TesterArgs,
};
use crate::error::{AppError, AppResult, ConfigurationError, ValidationError};

use super::load_payload;

/// Request payload attached to body-carrying methods.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialised once and sent as `application/json`.
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

/// Validated, immutable settings for one load test run.
#[derive(Debug, Clone)]
pub struct TestConfiguration {
    url: Url,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body: Option<RequestBody>,
    requests: PositiveU64,
    concurrency: PositiveUsize,
    rate: PositiveU64,
    pacing: Pacing,
    connect_timeout: Duration,
    request_timeout: Duration,
    drain_timeout: Duration,
}

impl TestConfiguration {
    /// Builds a configuration with default pacing, no headers and no body.
    ///
    /// # Errors
    ///
    /// Returns an error when a count is zero or the URL is not an absolute
    /// http(s) URL with a host.
    pub fn new(
        url: &str,
        method: HttpMethod,
        requests: u64,
        concurrency: usize,
        rate: u64,
    ) -> Result<Self, ConfigurationError> {
        let requests =
            PositiveU64::try_from(requests).map_err(|_err| ConfigurationError::RequestsZero)?;
        let concurrency = PositiveUsize::try_from(concurrency)
            .map_err(|_err| ConfigurationError::ConcurrencyZero)?;
        let rate = PositiveU64::try_from(rate).map_err(|_err| ConfigurationError::RateZero)?;

        Ok(Self {
            url: parse_target_url(url)?,
            method,
            headers: BTreeMap::new(),
            body: None,
            requests,
            concurrency,
            rate,
            pacing: Pacing::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    /// Builds the run configuration from merged CLI/config-file arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is missing or invalid, a header cannot be
    /// sent, or the payload cannot be loaded.
    pub fn from_args(args: &TesterArgs) -> AppResult<Self> {
        let url = args
            .url
            .as_deref()
            .ok_or_else(|| AppError::validation(ValidationError::MissingUrl))?;
        let mut config = Self::new(
            url,
            args.method,
            args.requests.get(),
            args.concurrency.get(),
            args.rate.get(),
        )?
        .with_headers(args.headers.iter().cloned())?
        .with_pacing(args.pacing)
        .with_timeouts(args.connect_timeout, args.request_timeout)?
        .with_drain_timeout(args.drain_timeout);

        if let Some(data) = args.data.as_deref() {
            config = config.with_body(load_payload(data)?);
        }
        Ok(config)
    }

    /// Adds headers, replacing earlier values for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error when a header name or value is not valid HTTP.
    pub fn with_headers<I>(mut self, headers: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigurationError::InvalidHeaderName { name });
            }
            if HeaderValue::from_str(&value).is_err() {
                return Err(ConfigurationError::InvalidHeaderValue { name });
            }
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the connection-establishment and total per-request bounds.
    ///
    /// # Errors
    ///
    /// Returns an error when either bound is zero.
    pub fn with_timeouts(
        mut self,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        if connect_timeout.is_zero() {
            return Err(ConfigurationError::TimeoutZero {
                field: "connect timeout",
            });
        }
        if request_timeout.is_zero() {
            return Err(ConfigurationError::TimeoutZero {
                field: "request timeout",
            });
        }
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        Ok(self)
    }

    #[must_use]
    pub const fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Body to send, if any. Only body-carrying methods report one.
    #[must_use]
    pub fn body(&self) -> Option<&RequestBody> {
        if self.method.carries_body() {
            self.body.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests.get()
    }

    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate.get()
    }

    #[must_use]
    pub const fn pacing(&self) -> Pacing {
        self.pacing
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// True when the target is loopback or a private network address.
    #[must_use]
    pub fn is_local_target(&self) -> bool {
        match self.url.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.to_ascii_lowercase();
                domain == "localhost" || domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
            None => false,
        }
    }
}

fn parse_target_url(raw: &str) -> Result<Url, ConfigurationError> {
    let url = Url::parse(raw).map_err(|err| ConfigurationError::InvalidUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigurationError::UnsupportedScheme {
            url: raw.to_owned(),
        });
    }
    if url.host().is_none() {
        return Err(ConfigurationError::MissingHost {
            url: raw.to_owned(),
        });
    }
    Ok(url)
}

const fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
        IpAddr::V6(ip) => ip.is_loopback(),
    }
}
