use crate::config::TransportConfig;
use reqwest::Client;
use std::time::Duration;

pub fn build_backend_client() -> Client {
    build_backend_client_with(&TransportConfig::default())
}

/// Client used for every backend call. The cookie store carries the
/// per-resource session credentials the backend hands out.
pub fn build_backend_client_with(transport: &TransportConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(transport.timeout_secs))
        .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
        .cookie_store(true)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}
