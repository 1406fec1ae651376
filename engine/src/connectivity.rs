//! Connectivity probing.

use async_trait::async_trait;

/// Answers "can we reach the network right now?".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// A probe that always reports online, for hosts that manage connectivity
/// themselves and drive the engine via `set_connected`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Default probe: a HEAD request against a well-known endpoint. Any
/// response, whatever its status, counts as online; only a failure to get
/// one at all counts as offline.
#[cfg(feature = "http-probe")]
pub struct HttpProbe {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "http-probe")]
impl HttpProbe {
    const DEFAULT_ENDPOINT: &'static str = "https://www.gstatic.com/generate_204";

    pub fn new() -> Self {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(feature = "http-probe")]
impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http-probe")]
#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        self.client.head(&self.endpoint).send().await.is_ok()
    }
}
