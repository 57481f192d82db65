use futures_util::future::join;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::gateway::{Gateway, TranslateRequest, TranslateResponse, require_key};
use crate::languages;

/// How a failed side affects the other result slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Any failure puts the same error record in both slots.
    #[default]
    Shared,
    /// Each slot keeps its own outcome.
    PerSide,
}

impl ErrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMode::Shared => "shared",
            ErrorMode::PerSide => "per-side",
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorMode {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "shared" => Ok(ErrorMode::Shared),
            "per-side" | "per_side" => Ok(ErrorMode::PerSide),
            other => Err(ApiError::validation(format!(
                "unknown error mode '{}' (expected shared or per-side)",
                other
            ))),
        }
    }
}

/// Outcome of one translate call. Success fields and `error` never coexist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_source_language: Option<String>,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationResult {
    pub fn success(text: impl Into<String>, detected_source_language: Option<String>) -> Self {
        Self {
            text: text.into(),
            detected_source_language,
            timestamp: now_millis(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            detected_source_language: None,
            timestamp: now_millis(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub style_rule_id: Option<String>,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadPair {
    pub baseline: TranslateRequest,
    pub custom: TranslateRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub id: u64,
    pub baseline: TranslationResult,
    pub custom: TranslationResult,
    pub payloads: PayloadPair,
    pub elapsed_ms: u64,
}

/// Builds the plain and the augmented payload. Only the augmented one ever
/// carries a style rule or instructions.
pub fn build_payloads(request: &ComparisonRequest) -> PayloadPair {
    let source_lang = Some(request.source_lang.trim())
        .filter(|code| !code.is_empty() && !languages::is_auto_detect(code))
        .map(str::to_string);
    let baseline = TranslateRequest {
        text: vec![request.text.clone()],
        source_lang,
        target_lang: request.target_lang.trim().to_string(),
        style_rule_id: None,
        custom_instructions: None,
    };

    let style_rule_id = request
        .style_rule_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let custom_instructions = if request.instructions.is_empty() {
        None
    } else {
        Some(request.instructions.clone())
    };
    let custom = TranslateRequest {
        style_rule_id,
        custom_instructions,
        ..baseline.clone()
    };

    PayloadPair { baseline, custom }
}

/// Runs baseline and custom translations side by side. Each comparison gets
/// a monotonically increasing id.
#[derive(Debug, Clone)]
pub struct Comparator<G: Gateway> {
    gateway: G,
    error_mode: ErrorMode,
    sequence: Arc<AtomicU64>,
}

impl<G: Gateway> Comparator<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            error_mode: ErrorMode::default(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn compare(
        &self,
        key: &str,
        request: &ComparisonRequest,
    ) -> Result<Comparison, ApiError> {
        if request.text.trim().is_empty() {
            return Err(ApiError::validation("Please enter text to translate"));
        }
        require_key(key)?;

        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let payloads = build_payloads(request);
        debug!(
            "comparison #{}: style_rule={:?}, instructions={}",
            id,
            payloads.custom.style_rule_id,
            request.instructions.len()
        );

        let started = Instant::now();
        let (baseline, custom) = join(
            self.gateway.translate(key, payloads.baseline.clone()),
            self.gateway.translate(key, payloads.custom.clone()),
        )
        .await;
        let (baseline, custom) = settle(
            baseline.and_then(first_translation),
            custom.and_then(first_translation),
            self.error_mode,
        );

        Ok(Comparison {
            id,
            baseline,
            custom,
            payloads,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn first_translation(response: TranslateResponse) -> Result<TranslationResult, ApiError> {
    let translation = response
        .translations
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::parse("no translations returned"))?;
    Ok(TranslationResult::success(
        translation.text,
        translation.detected_source_language,
    ))
}

fn settle(
    baseline: Result<TranslationResult, ApiError>,
    custom: Result<TranslationResult, ApiError>,
    error_mode: ErrorMode,
) -> (TranslationResult, TranslationResult) {
    match error_mode {
        ErrorMode::Shared => match (baseline, custom) {
            (Ok(baseline), Ok(custom)) => (baseline, custom),
            (Err(err), _) | (_, Err(err)) => {
                let failed = TranslationResult::failure(err.to_string());
                (failed.clone(), failed)
            }
        },
        ErrorMode::PerSide => (
            baseline.unwrap_or_else(|err| TranslationResult::failure(err.to_string())),
            custom.unwrap_or_else(|err| TranslationResult::failure(err.to_string())),
        ),
    }
}

/// Holds the newest comparison. Results that settle after a newer one has
/// been published are dropped.
#[derive(Debug, Default)]
pub struct ResultBoard {
    latest: Mutex<Option<Comparison>>,
}

impl ResultBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `comparison` is older than what is shown.
    pub fn publish(&self, comparison: Comparison) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = latest.as_ref()
            && current.id > comparison.id
        {
            warn!(
                "dropping stale comparison #{} (showing #{})",
                comparison.id, current.id
            );
            return false;
        }
        *latest = Some(comparison);
        true
    }

    pub fn latest(&self) -> Option<Comparison> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayFuture, StyleRulesQuery, StyleRulesResponse, Translation};
    use insta::assert_json_snapshot;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct FakeGateway {
        calls: Arc<Mutex<Vec<TranslateRequest>>>,
        fail_custom: bool,
        delay_ms: u64,
    }

    impl FakeGateway {
        fn calls(&self) -> Vec<TranslateRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Gateway for FakeGateway {
        fn translate(
            &self,
            _key: &str,
            request: TranslateRequest,
        ) -> GatewayFuture<TranslateResponse> {
            let gateway = self.clone();
            Box::pin(async move {
                gateway.calls.lock().unwrap().push(request.clone());
                if gateway.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(gateway.delay_ms)).await;
                }
                let augmented =
                    request.style_rule_id.is_some() || request.custom_instructions.is_some();
                if augmented && gateway.fail_custom {
                    return Err(ApiError::Upstream {
                        status: 456,
                        message: "DeepL API error: Quota Exceeded".to_string(),
                        details: None,
                    });
                }
                let suffix = if augmented { " (custom)" } else { "" };
                Ok(TranslateResponse {
                    translations: vec![Translation {
                        detected_source_language: Some("EN".to_string()),
                        text: format!("[{}] {}{}", request.target_lang, request.text[0], suffix),
                    }],
                })
            })
        }

        fn list_style_rules(
            &self,
            _key: &str,
            _query: StyleRulesQuery,
        ) -> GatewayFuture<StyleRulesResponse> {
            Box::pin(async move {
                Ok(StyleRulesResponse {
                    style_rules: Vec::new(),
                    pagination: None,
                })
            })
        }
    }

    fn request(text: &str) -> ComparisonRequest {
        ComparisonRequest {
            text: text.to_string(),
            source_lang: "auto".to_string(),
            target_lang: "de".to_string(),
            style_rule_id: None,
            instructions: Vec::new(),
        }
    }

    #[test]
    fn plain_request_yields_identical_payloads() {
        let payloads = build_payloads(&request("Hello world"));
        assert_eq!(payloads.baseline, payloads.custom);
        assert_eq!(
            serde_json::to_value(&payloads.custom).unwrap(),
            serde_json::json!({"text": ["Hello world"], "target_lang": "de"})
        );
    }

    #[test]
    fn augmentation_only_reaches_custom_payload() {
        let mut request = request("Hello");
        request.source_lang = "en".to_string();
        request.style_rule_id = Some("sr-42".to_string());
        request.instructions = vec!["Sound like a pirate".to_string(), "Be brief".to_string()];
        assert_json_snapshot!(build_payloads(&request), @r###"
        {
          "baseline": {
            "text": [
              "Hello"
            ],
            "source_lang": "en",
            "target_lang": "de"
          },
          "custom": {
            "text": [
              "Hello"
            ],
            "source_lang": "en",
            "target_lang": "de",
            "style_rule_id": "sr-42",
            "custom_instructions": [
              "Sound like a pirate",
              "Be brief"
            ]
          }
        }
        "###);
    }

    #[test]
    fn blank_style_rule_is_treated_as_unselected() {
        let mut request = request("Hello");
        request.style_rule_id = Some("  ".to_string());
        let payloads = build_payloads(&request);
        assert_eq!(payloads.custom.style_rule_id, None);
        assert_eq!(payloads.baseline, payloads.custom);
    }

    #[test]
    fn source_language_is_omitted_only_for_auto() {
        for (source, expected) in [("auto", None), ("AUTO", None), ("fr", Some("fr"))] {
            let mut request = request("Bonjour");
            request.source_lang = source.to_string();
            request.instructions = vec!["Keep it short".to_string()];
            let payloads = build_payloads(&request);
            assert_eq!(payloads.baseline.source_lang.as_deref(), expected);
            assert_eq!(payloads.custom.source_lang.as_deref(), expected);
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_call() {
        let gateway = FakeGateway::default();
        let comparator = Comparator::new(gateway.clone());
        let err = comparator.compare("key", &request("  \n ")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = comparator.compare(" ", &request("Hi")).await.unwrap_err();
        assert_eq!(err, ApiError::validation("API key is required"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn both_sides_are_translated() {
        let gateway = FakeGateway::default();
        let comparator = Comparator::new(gateway.clone());
        let mut request = request("Hello");
        request.instructions = vec!["Be brief".to_string()];

        let comparison = comparator.compare("key", &request).await.unwrap();
        assert_eq!(comparison.id, 1);
        assert_eq!(comparison.baseline.text, "[de] Hello");
        assert_eq!(comparison.custom.text, "[de] Hello (custom)");
        assert_eq!(
            comparison.custom.detected_source_language.as_deref(),
            Some("EN")
        );
        assert!(!comparison.baseline.is_error());
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn shared_mode_copies_one_failure_into_both_slots() {
        let gateway = FakeGateway {
            fail_custom: true,
            ..FakeGateway::default()
        };
        let comparator = Comparator::new(gateway);
        let mut request = request("Hello");
        request.style_rule_id = Some("sr-1".to_string());

        let comparison = comparator.compare("key", &request).await.unwrap();
        assert!(comparison.baseline.is_error());
        assert_eq!(comparison.baseline.error, comparison.custom.error);
        assert_eq!(
            comparison.custom.error.as_deref(),
            Some("DeepL API error: Quota Exceeded (status 456)")
        );
        assert_eq!(comparison.baseline.text, "");
    }

    #[tokio::test]
    async fn per_side_mode_keeps_the_successful_side() {
        let gateway = FakeGateway {
            fail_custom: true,
            ..FakeGateway::default()
        };
        let comparator = Comparator::new(gateway).with_error_mode(ErrorMode::PerSide);
        let mut request = request("Hello");
        request.style_rule_id = Some("sr-1".to_string());

        let comparison = comparator.compare("key", &request).await.unwrap();
        assert_eq!(comparison.baseline.text, "[de] Hello");
        assert!(!comparison.baseline.is_error());
        assert!(comparison.custom.is_error());
    }

    #[tokio::test]
    async fn concurrent_comparisons_both_settle() {
        let gateway = FakeGateway {
            delay_ms: 20,
            ..FakeGateway::default()
        };
        let comparator = Comparator::new(gateway.clone());
        let board = ResultBoard::new();
        let first = request("first");
        let second = request("second");

        let (a, b) = tokio::join!(
            comparator.compare("key", &first),
            comparator.compare("key", &second)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(gateway.calls().len(), 4);

        let newest = a.id.max(b.id);
        board.publish(a);
        board.publish(b);
        assert_eq!(board.latest().map(|comparison| comparison.id), Some(newest));
    }

    #[tokio::test]
    async fn stale_results_are_dropped() {
        let comparator = Comparator::new(FakeGateway::default());
        let older = comparator.compare("key", &request("old")).await.unwrap();
        let newer = comparator.compare("key", &request("new")).await.unwrap();
        let board = ResultBoard::new();

        assert!(board.publish(newer));
        assert!(!board.publish(older));
        let shown = board.latest().unwrap();
        assert_eq!(shown.baseline.text, "[de] new");
    }

    #[test]
    fn error_mode_parses_both_spellings() {
        assert_eq!("per_side".parse::<ErrorMode>().unwrap(), ErrorMode::PerSide);
        assert_eq!(" Shared ".parse::<ErrorMode>().unwrap(), ErrorMode::Shared);
        assert!("both".parse::<ErrorMode>().is_err());
    }
}
