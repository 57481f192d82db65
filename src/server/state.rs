use crate::gateway::DeepL;

/// Shared, read-only state of the relay: the upstream provider client.
#[derive(Debug, Clone)]
pub struct RelayState {
    pub(crate) upstream: DeepL,
}

impl RelayState {
    pub fn new(http: reqwest::Client, upstream_base_url: &str) -> Self {
        Self {
            upstream: DeepL::new(http).with_base_url(upstream_base_url),
        }
    }

    pub fn upstream_base_url(&self) -> &str {
        self.upstream.base_url()
    }
}
