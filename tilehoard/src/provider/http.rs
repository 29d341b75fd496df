//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::types::ProviderError;

/// Async HTTP client operations used by the fetch workers.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request with extra request headers.
    ///
    /// Any non-2xx status is returned as [`ProviderError::Status`] so callers
    /// can classify it.
    fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// Non-blocking HTTP client backed by reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the given per-request timeout and default User-Agent.
    ///
    /// Keeps a warm connection pool so concurrent workers hitting the same
    /// host reuse connections.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProviderError::Client(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, ProviderError> {
        trace!(url = url, "HTTP GET request starting");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(classify_send_error(url, &e));
            }
        };

        let status = response.status();
        debug!(url = url, status = status.as_u16(), "HTTP response received");

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(body) => Ok(body.to_vec()),
            Err(e) if e.is_timeout() => Err(ProviderError::Timeout {
                url: url.to_string(),
            }),
            Err(e) => Err(ProviderError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn classify_send_error(url: &str, e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_builder() {
        ProviderError::Client(e.to_string())
    } else {
        ProviderError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Minimal body that passes image format sniffing.
    pub const PNG_TILE: &[u8] = &[
        0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 0x0d, b'I', b'H', b'D', b'R',
    ];

    type Responder = dyn Fn(&str, usize) -> Result<Vec<u8>, ProviderError> + Send + Sync;

    /// Mock HTTP client driven by a closure.
    ///
    /// The closure receives the URL and how many times that URL was requested
    /// before (0 for the first request).
    pub struct MockHttpClient {
        responder: Box<Responder>,
        per_url: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockHttpClient {
        pub fn new<F>(responder: F) -> Self
        where
            F: Fn(&str, usize) -> Result<Vec<u8>, ProviderError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                per_url: Mutex::new(HashMap::new()),
                total: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Every request succeeds with a PNG body.
        pub fn always_ok() -> Self {
            Self::new(|_, _| Ok(PNG_TILE.to_vec()))
        }

        /// Every request fails with the given status.
        pub fn always_status(status: u16) -> Self {
            Self::new(move |url, _| {
                Err(ProviderError::Status {
                    status,
                    url: url.to_string(),
                })
            })
        }

        pub fn total_calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }

        pub fn calls_for(&self, url: &str) -> usize {
            self.per_url.lock().get(url).copied().unwrap_or(0)
        }

        /// Number of requests whose URL starts with `prefix`.
        pub fn calls_with_prefix(&self, prefix: &str) -> usize {
            self.requests
                .lock()
                .iter()
                .filter(|(url, _)| url.starts_with(prefix))
                .count()
        }

        pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.requests.lock().clone()
        }

        /// GET without extra headers.
        pub async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
            self.get_with_headers(url, &[]).await
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        async fn get_with_headers(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<Vec<u8>, ProviderError> {
            self.total.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .push((url.to_string(), headers.to_vec()));
            let seen = {
                let mut per_url = self.per_url.lock();
                let count = per_url.entry(url.to_string()).or_insert(0);
                let seen = *count;
                *count += 1;
                seen
            };
            (self.responder)(url, seen)
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::always_ok();

        let result = mock.get("http://example.com/1/2/3.png").await;
        assert_eq!(result.unwrap(), PNG_TILE.to_vec());
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_counts_per_url() {
        let mock = MockHttpClient::new(|url, seen| {
            if seen < 2 {
                Err(ProviderError::Status {
                    status: 503,
                    url: url.to_string(),
                })
            } else {
                Ok(PNG_TILE.to_vec())
            }
        });

        assert!(mock.get("http://a.test/0/0/0").await.is_err());
        assert!(mock.get("http://a.test/0/0/0").await.is_err());
        assert!(mock.get("http://a.test/0/0/0").await.is_ok());
        assert_eq!(mock.calls_for("http://a.test/0/0/0"), 3);
        assert_eq!(mock.calls_with_prefix("http://a.test"), 3);
    }

    #[tokio::test]
    async fn test_mock_client_records_headers() {
        let mock = MockHttpClient::always_ok();
        let headers = vec![("User-Agent".to_string(), "tilehoard-test".to_string())];
        mock.get_with_headers("http://a.test/1/1/1", &headers)
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].1, headers);
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(AsyncReqwestClient::new(Duration::from_secs(5), "tilehoard-test").is_ok());
    }
}
