//! HTTP client utilities.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Proxy, RequestBuilder, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Browser identification sent with every request.
///
/// Several sources reject default client identifiers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Settings for building an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Requests per second across all requests made through the client; `None` disables throttling
    pub requests_per_second: Option<f32>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            requests_per_second: Some(5.0),
            http_proxy: None,
            https_proxy: None,
        }
    }
}

/// Shared HTTP client with a browser user agent and optional rate limiting
///
/// No overall request timeout is set on the client: searches are bounded by
/// the aggregator and downloads bound each phase themselves.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(&HttpSettings::default())
    }

    /// Create a new HTTP client from explicit settings
    pub fn with_settings(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(&settings.user_agent)
            .connect_timeout(settings.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(ref proxy) = settings.http_proxy {
            builder = builder.proxy(Proxy::http(proxy)?);
        }
        if let Some(ref proxy) = settings.https_proxy {
            builder = builder.proxy(Proxy::https(proxy)?);
        }

        let limiter = settings
            .requests_per_second
            .and_then(quota_for)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self {
            client: Arc::new(builder.build()?),
            limiter,
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start a GET request that waits for the rate limiter when sent
    pub fn get(&self, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            inner: self.client.get(url),
            limiter: self.limiter.clone(),
        }
    }
}

fn quota_for(requests_per_second: f32) -> Option<Quota> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }
    Quota::with_period(Duration::from_secs_f32(1.0 / requests_per_second))
}

/// Request builder that waits for a rate limiter permit before sending
#[derive(Debug)]
pub struct RateLimitedRequestBuilder {
    inner: RequestBuilder,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimitedRequestBuilder {
    /// Add a header
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Add query parameters
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.inner = self.inner.query(query);
        self
    }

    /// Wait for the limiter, then send the request
    pub async fn send(self) -> Result<Response, reqwest::Error> {
        if let Some(limiter) = self.limiter {
            limiter.until_ready().await;
        }
        self.inner.send().await
    }
}
