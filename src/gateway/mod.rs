use reqwest::Response;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

use crate::error::ApiError;

mod deepl;
mod models;
mod relay;

pub use deepl::DeepL;
pub use models::{
    DEFAULT_STYLE_RULES_PAGE_SIZE, Pagination, StyleRule, StyleRuleInstructions, StyleRulesQuery,
    StyleRulesResponse, TranslateRequest, TranslateResponse, Translation,
};
pub use relay::RelayClient;
pub(crate) use relay::API_KEY_HEADER;

pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

/// A route to the translation provider. Every call is a single attempt;
/// callers decide whether to try again.
pub trait Gateway: Clone + Send + Sync + 'static {
    fn translate(&self, key: &str, request: TranslateRequest) -> GatewayFuture<TranslateResponse>;
    fn list_style_rules(
        &self,
        key: &str,
        query: StyleRulesQuery,
    ) -> GatewayFuture<StyleRulesResponse>;
}

#[derive(Debug, Clone)]
pub enum GatewayImpl {
    DeepL(DeepL),
    Relay(RelayClient),
}

impl Gateway for GatewayImpl {
    fn translate(&self, key: &str, request: TranslateRequest) -> GatewayFuture<TranslateResponse> {
        match self {
            GatewayImpl::DeepL(gateway) => gateway.translate(key, request),
            GatewayImpl::Relay(gateway) => gateway.translate(key, request),
        }
    }

    fn list_style_rules(
        &self,
        key: &str,
        query: StyleRulesQuery,
    ) -> GatewayFuture<StyleRulesResponse> {
        match self {
            GatewayImpl::DeepL(gateway) => gateway.list_style_rules(key, query),
            GatewayImpl::Relay(gateway) => gateway.list_style_rules(key, query),
        }
    }
}

/// Picks the relay when one is configured, the provider otherwise.
pub fn build_gateway(
    http: reqwest::Client,
    upstream_base_url: &str,
    relay_url: Option<&str>,
) -> GatewayImpl {
    match relay_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => GatewayImpl::Relay(RelayClient::new(http, url)),
        None => GatewayImpl::DeepL(DeepL::new(http).with_base_url(upstream_base_url)),
    }
}

pub(crate) fn require_key(key: &str) -> Result<(), ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::validation("API key is required"));
    }
    Ok(())
}

pub(crate) fn reason_phrase(status: reqwest::StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::parse(format!("unexpected response shape: {}", err)))
}

/// Reads a provider response: non-success keeps the raw body for
/// diagnostics, success must be JSON.
pub(crate) async fn read_upstream_json(response: Response, label: &str) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            message: format!("{}: {}", label, reason_phrase(status)),
            details: Some(text),
        });
    }
    serde_json::from_str(&text)
        .map_err(|err| ApiError::parse(format!("failed to parse response JSON: {}", err)))
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
