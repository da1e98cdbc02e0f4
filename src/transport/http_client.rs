use reqwest::Client;
use std::time::Duration;

/// One pooled client per `Transport`; `timeout` bounds a single request, not
/// the approval wait built on top of it.
pub fn build_http_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}
