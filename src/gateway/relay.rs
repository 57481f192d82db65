use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    Gateway, GatewayFuture, StyleRulesQuery, StyleRulesResponse, TranslateRequest,
    TranslateResponse, decode, normalize_base_url, reason_phrase, require_key,
};
use crate::error::ApiError;

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// Client for the relay server. Translate calls carry the credential in the
/// JSON body (`apiKey`), style-rule listings in the `x-api-key` header.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(http: reqwest::Client, base_url: impl AsRef<str>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url.as_ref()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Gateway for RelayClient {
    fn translate(&self, key: &str, request: TranslateRequest) -> GatewayFuture<TranslateResponse> {
        let client = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            require_key(&key)?;
            let body = relay_body(&key, &request)?;
            let url = format!("{}/translate", client.base_url);
            debug!("POST {}", url);
            let response = client.http.post(&url).json(&body).send().await?;
            decode(read_relay_json(response).await?)
        })
    }

    fn list_style_rules(
        &self,
        key: &str,
        query: StyleRulesQuery,
    ) -> GatewayFuture<StyleRulesResponse> {
        let client = self.clone();
        let key = key.to_string();
        Box::pin(async move {
            require_key(&key)?;
            let url = format!("{}/style-rules", client.base_url);
            debug!("GET {}", url);
            let response = client
                .http
                .get(&url)
                .header(API_KEY_HEADER, key.trim())
                .query(&query.to_pairs())
                .send()
                .await?;
            decode(read_relay_json(response).await?)
        })
    }
}

fn relay_body(key: &str, request: &TranslateRequest) -> Result<Value, ApiError> {
    let mut body = serde_json::to_value(request)
        .map_err(|err| ApiError::validation(format!("invalid request: {}", err)))?;
    if let Value::Object(map) = &mut body {
        map.insert("apiKey".to_string(), Value::String(key.trim().to_string()));
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: Option<String>,
    details: Option<Value>,
}

async fn read_relay_json(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return serde_json::from_str(&text)
            .map_err(|err| ApiError::parse(format!("failed to parse response JSON: {}", err)));
    }

    let parsed = serde_json::from_str::<RelayErrorBody>(&text).ok();
    let message = parsed
        .as_ref()
        .and_then(|body| body.error.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("API error: {}", reason_phrase(status)));
    let details = match parsed.and_then(|body| body.details) {
        Some(Value::String(details)) => Some(details),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    Err(ApiError::Upstream {
        status: status.as_u16(),
        message,
        details,
    })
}
