//! The transport gateway.

use crate::{RequestGate, RetryPolicy, RetryStats, UserAgentCycle};
use futures_util::StreamExt;
use magpie_core::NetworkConfig;
use magpie_error::{MagpieResult, TransportError, TransportErrorKind};
use magpie_interface::ByteStream;
use reqwest::header::{CONTENT_RANGE, COOKIE, RANGE, REFERER, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Single gateway for every remote call.
///
/// Injects session cookies and a rotating user agent, traverses the
/// process-wide [`RequestGate`], applies the per-request timeout, and
/// retries per [`RetryPolicy`]. Constructed once and shared.
pub struct Transport {
    client: reqwest::Client,
    gate: Arc<RequestGate>,
    agents: Arc<UserAgentCycle>,
    retry: RetryPolicy,
    retry_stats: Arc<RetryStats>,
    timeout: Duration,
    session: RwLock<SessionHeaders>,
}

#[derive(Default)]
struct SessionHeaders {
    cookie: Option<String>,
    referer: Option<String>,
}

impl Transport {
    /// Build a transport from the network configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the rate gate or user-agent cycle
    /// cannot be constructed, and a `Transient` transport error when the
    /// underlying client fails to initialize.
    pub fn new(config: &NetworkConfig) -> MagpieResult<Self> {
        let timeout = Duration::from_secs_f64(config.timeout.max(0.001));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TransportError::new(TransportErrorKind::Transient(format!(
                    "client initialization failed: {}",
                    e
                )))
            })?;
        let gate = Arc::new(RequestGate::new(
            config.request_interval,
            config.random_offset,
        )?);
        let agents = Arc::new(UserAgentCycle::new(
            config.user_agents.clone(),
            config.ua_rotate_interval.map(Duration::from_secs),
            config.ua_rotate_requests,
        )?);
        let retry_stats = Arc::new(RetryStats::default());
        Ok(Self {
            client,
            gate,
            agents,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_interval)
                .with_stats(retry_stats.clone()),
            retry_stats,
            timeout,
            session: RwLock::new(SessionHeaders::default()),
        })
    }

    /// Counters of rate-limit and transient events seen by the retry
    /// layer, for the aggregate report.
    pub fn retry_stats(&self) -> Arc<RetryStats> {
        self.retry_stats.clone()
    }

    /// Install or clear the session cookie header used on every request.
    pub fn set_session_cookies(&self, cookie_header: Option<String>) {
        self.session.write().unwrap().cookie = cookie_header;
    }

    /// Install the referer header used on every request.
    pub fn set_referer(&self, referer: Option<String>) {
        self.session.write().unwrap().referer = referer;
    }

    /// GET a JSON document, with rate limiting and retry.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> MagpieResult<T> {
        self.get_json_checked(url, params, |_: &T| Ok(())).await
    }

    /// GET a JSON document, additionally classifying the decoded body.
    ///
    /// `check` lets the caller surface service-level failure indicators
    /// (an error code inside a 200 envelope) as transport kinds, so they
    /// traverse the same retry loop as HTTP-level failures.
    #[instrument(skip(self, params, check), fields(url = %url))]
    pub async fn get_json_checked<T, F>(
        &self,
        url: &str,
        params: &[(&str, String)],
        check: F,
    ) -> MagpieResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Result<(), TransportErrorKind>,
    {
        let check = &check;
        self.retry
            .run(|| async move {
                let response = self.send_once(Method::GET, url, params, None).await?;
                let body = response.bytes().await.map_err(|e| {
                    TransportError::new(TransportErrorKind::Transient(format!(
                        "failed to read body: {}",
                        e
                    )))
                })?;
                let value: T = serde_json::from_slice(&body).map_err(|e| {
                    TransportError::new(TransportErrorKind::Decode(e.to_string()))
                })?;
                check(&value).map_err(TransportError::new)?;
                Ok(value)
            })
            .await
            .map_err(Into::into)
    }

    /// Open a ranged byte stream starting at `offset`, with rate limiting
    /// and retry on the request itself (not the body).
    ///
    /// When `offset > 0` the server must honor the `Range` header; a plain
    /// 200 response in that case is classified `Transient` so the caller's
    /// retry can re-issue.
    #[instrument(skip(self), fields(url = %url, offset = offset))]
    pub async fn fetch_range(&self, url: &str, offset: u64) -> MagpieResult<ByteStream> {
        let range = (offset > 0).then(|| format!("bytes={}-", offset));
        let no_params: &[(&str, String)] = &[];
        let response = self
            .retry
            .run(|| self.send_once(Method::GET, url, no_params, range.as_deref()))
            .await?;

        if offset > 0 && response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(TransportError::new(TransportErrorKind::Transient(
                "server ignored byte range".to_string(),
            ))
            .into());
        }

        let total_length = total_entity_length(&response, offset);
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                TransportError::new(TransportErrorKind::Transient(format!(
                    "stream read failed: {}",
                    e
                )))
                .into()
            })
        });
        Ok(ByteStream {
            total_length,
            stream: Box::pin(stream),
        })
    }

    /// Issue one classified request through the gate.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        range: Option<&str>,
    ) -> Result<Response, TransportError> {
        self.gate.admit().await;

        let agent = self.agents.next_agent();
        let mut request = self
            .client
            .request(method, url)
            .header(USER_AGENT, agent)
            .query(params);
        {
            let session = self.session.read().unwrap();
            if let Some(cookie) = &session.cookie {
                request = request.header(COOKIE, cookie.clone());
            }
            if let Some(referer) = &session.referer {
                request = request.header(REFERER, referer.clone());
            }
        }
        if let Some(range) = range {
            request = request.header(RANGE, range.to_string());
        }

        let response = request.send().await.map_err(classify_reqwest)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::PARTIAL_CONTENT {
            debug!(status = %status, "Request succeeded");
            return Ok(response);
        }
        let retry_after = parse_retry_after(&response);
        Err(TransportError::new(classify_status(status, retry_after)))
    }

    /// Probe the configured hosts before any login attempt.
    ///
    /// Each URL is probed with a TCP connect followed by an HTTP HEAD, both
    /// under the configured timeout. One reachable host is enough; total
    /// failure yields `NetworkUnavailable`.
    #[instrument(skip(self, urls))]
    pub async fn precheck(&self, urls: &[String]) -> MagpieResult<()> {
        for url in urls {
            if self.probe_url(url).await {
                info!(url = %url, "Network pre-check passed");
                return Ok(());
            }
            warn!(url = %url, "Probe host unreachable");
        }
        Err(TransportError::new(TransportErrorKind::NetworkUnavailable(format!(
            "all {} probe hosts unreachable",
            urls.len()
        )))
        .into())
    }

    async fn probe_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let port = parsed.port_or_known_default().unwrap_or(443);

        let tcp = tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await;
        if !matches!(tcp, Ok(Ok(_))) {
            return false;
        }

        let head = self.client.head(url).timeout(self.timeout).send().await;
        head.is_ok()
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Map a reqwest failure to a transport kind.
fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        TransportError::new(TransportErrorKind::Transient(error.to_string()))
    } else {
        TransportError::new(TransportErrorKind::Remote {
            code: 0,
            message: error.to_string(),
        })
    }
}

/// Classify a non-success HTTP status per the transport contract.
fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> TransportErrorKind {
    match status.as_u16() {
        401 | 403 => TransportErrorKind::AuthExpired,
        404 => TransportErrorKind::NotFound,
        429 => TransportErrorKind::RateLimited { retry_after },
        code if status.is_server_error() => {
            TransportErrorKind::Transient(format!("server error {}", code))
        }
        code => TransportErrorKind::Remote {
            code: i64::from(code),
            message: status
                .canonical_reason()
                .unwrap_or("unrecognized status")
                .to_string(),
        },
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Full entity size for a ranged response.
///
/// A 206 advertises it in `Content-Range: bytes start-end/total`; a fresh
/// 200 advertises it as the content length.
fn total_entity_length(response: &Response, offset: u64) -> Option<u64> {
    if offset > 0 {
        let header = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
        let total = header.rsplit('/').next()?;
        total.trim().parse::<u64>().ok()
    } else {
        response.content_length()
    }
}
