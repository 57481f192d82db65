use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::debug;

use super::{
    Gateway, GatewayFuture, StyleRulesQuery, StyleRulesResponse, TranslateRequest,
    TranslateResponse, decode, normalize_base_url, read_upstream_json, require_key,
};
use crate::error::ApiError;

const DEFAULT_BASE_URL: &str = "https://api.deepl.com";
const TRANSLATE_PATH: &str = "/v2/translate";
const STYLE_RULES_PATH: &str = "/v3/style_rules";
const ERROR_LABEL: &str = "DeepL API error";

/// Direct client for the translation provider. The credential always
/// travels in the `Authorization` header, never in the URL or body.
#[derive(Debug, Clone)]
pub struct DeepL {
    http: reqwest::Client,
    base_url: String,
}

impl DeepL {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        let base_url = normalize_base_url(base_url.as_ref());
        if !base_url.is_empty() {
            self.base_url = base_url;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `body` as-is and returns the provider JSON untouched.
    pub async fn forward_translate(&self, key: &str, body: &Value) -> Result<Value, ApiError> {
        require_key(key)?;
        let url = format!("{}{}", self.base_url, TRANSLATE_PATH);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth_header(key))
            .json(body)
            .send()
            .await?;
        read_upstream_json(response, ERROR_LABEL).await
    }

    pub async fn forward_style_rules(
        &self,
        key: &str,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        require_key(key)?;
        let url = format!("{}{}", self.base_url, STYLE_RULES_PATH);
        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, auth_header(key))
            .query(query)
            .send()
            .await?;
        read_upstream_json(response, ERROR_LABEL).await
    }
}

impl Gateway for DeepL {
    fn translate(&self, key: &str, request: TranslateRequest) -> GatewayFuture<TranslateResponse> {
        let gateway = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            let body = serde_json::to_value(&request)
                .map_err(|err| ApiError::validation(format!("invalid request: {}", err)))?;
            let value = gateway.forward_translate(&key, &body).await?;
            decode(value)
        })
    }

    fn list_style_rules(
        &self,
        key: &str,
        query: StyleRulesQuery,
    ) -> GatewayFuture<StyleRulesResponse> {
        let gateway = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            let value = gateway.forward_style_rules(&key, &query.to_pairs()).await?;
            decode(value)
        })
    }
}

fn auth_header(key: &str) -> String {
    format!("DeepL-Auth-Key {}", key.trim())
}
