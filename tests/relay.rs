use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use translate_compare::gateway::{Gateway, StyleRulesQuery};
use translate_compare::server::{RelayState, router};
use translate_compare::{ApiError, Comparator, ComparisonRequest, DeepL, RelayClient};

#[derive(Clone, Default)]
struct Recorded {
    auth: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn authorization(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn stub_translate(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = authorization(&headers);
    recorded.auth.lock().unwrap().push(auth.clone());
    recorded.bodies.lock().unwrap().push(body.clone());
    if auth == "DeepL-Auth-Key bad" {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Wrong key"})));
    }
    let text = body["text"][0].as_str().unwrap_or_default().to_uppercase();
    let suffix = if body.get("custom_instructions").is_some() {
        " (custom)"
    } else {
        ""
    };
    (
        StatusCode::OK,
        Json(json!({
            "translations": [
                {"detected_source_language": "EN", "text": format!("{}{}", text, suffix)}
            ]
        })),
    )
}

async fn stub_style_rules(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    recorded.auth.lock().unwrap().push(authorization(&headers));
    recorded.queries.lock().unwrap().push(query);
    Json(json!({
        "style_rules": [{
            "style_id": "sr-1",
            "name": "Formal German",
            "language": "de",
            "version": 2,
            "configured_rules": {"style_and_tone": {"formality": "formal"}}
        }]
    }))
}

async fn spawn_upstream() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/v2/translate", post(stub_translate))
        .route("/v3/style_rules", get(stub_style_rules))
        .with_state(recorded.clone());
    (spawn(app).await, recorded)
}

async fn spawn_relay(upstream: &str) -> String {
    let state = Arc::new(RelayState::new(reqwest::Client::new(), upstream));
    spawn(router(state)).await
}

#[tokio::test]
async fn health_reports_ok() {
    let relay = spawn_relay("http://127.0.0.1:9").await;
    let body: Value = reqwest::get(format!("{}/health", relay))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn translate_without_key_is_rejected() {
    let (upstream, recorded) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let response = reqwest::Client::new()
        .post(format!("{}/translate", relay))
        .json(&json!({"text": ["Hello"], "target_lang": "de"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "API key is required"}));
    assert!(recorded.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn translate_forwards_credential_header_and_strips_it_from_body() {
    let (upstream, recorded) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let response = reqwest::Client::new()
        .post(format!("{}/translate", relay))
        .json(&json!({"apiKey": "secret:fx", "text": ["Hello"], "target_lang": "de"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["translations"][0]["text"], "HELLO");

    assert_eq!(*recorded.auth.lock().unwrap(), vec!["DeepL-Auth-Key secret:fx"]);
    assert_eq!(
        recorded.bodies.lock().unwrap()[0],
        json!({"text": ["Hello"], "target_lang": "de"})
    );
}

#[tokio::test]
async fn upstream_rejection_keeps_its_status() {
    let (upstream, _) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let response = reqwest::Client::new()
        .post(format!("{}/translate", relay))
        .json(&json!({"apiKey": "bad", "text": ["Hello"], "target_lang": "de"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "DeepL API error: Forbidden");
    assert!(body["details"].as_str().unwrap().contains("Wrong key"));
}

#[tokio::test]
async fn unreachable_upstream_is_an_internal_error() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);
    let relay = spawn_relay(&dead).await;
    let response = reqwest::Client::new()
        .post(format!("{}/translate", relay))
        .json(&json!({"apiKey": "secret", "text": ["Hello"], "target_lang": "de"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn style_rules_apply_default_query() {
    let (upstream, recorded) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/style-rules", relay))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 400);

    let response = client
        .get(format!("{}/style-rules?page=", relay))
        .header("x-api-key", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["style_rules"][0]["style_id"], "sr-1");

    let query = recorded.queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("detailed").map(String::as_str), Some("true"));
    assert_eq!(query.get("page").map(String::as_str), Some("0"));
    assert_eq!(query.get("page_size").map(String::as_str), Some("25"));
    assert_eq!(*recorded.auth.lock().unwrap(), vec!["DeepL-Auth-Key secret"]);
}

#[tokio::test]
async fn preflight_is_answered_without_upstream() {
    let relay = spawn_relay("http://127.0.0.1:9").await;
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/translate", relay))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-headers")
            .and_then(|value| value.to_str().ok()),
        Some("content-type,x-api-key")
    );
}

fn comparison_request() -> ComparisonRequest {
    ComparisonRequest {
        text: "Hello".to_string(),
        source_lang: "auto".to_string(),
        target_lang: "de".to_string(),
        style_rule_id: None,
        instructions: vec!["Be playful".to_string()],
    }
}

#[tokio::test]
async fn comparison_through_relay_client() {
    let (upstream, recorded) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let comparator = Comparator::new(RelayClient::new(reqwest::Client::new(), &relay));

    let comparison = comparator
        .compare("secret", &comparison_request())
        .await
        .unwrap();
    assert_eq!(comparison.baseline.text, "HELLO");
    assert_eq!(comparison.custom.text, "HELLO (custom)");
    assert_eq!(comparison.custom.detected_source_language.as_deref(), Some("EN"));
    assert_eq!(recorded.bodies.lock().unwrap().len(), 2);

    let rules = comparator
        .gateway()
        .list_style_rules("secret", StyleRulesQuery::default())
        .await
        .unwrap();
    assert_eq!(rules.style_rules[0].name, "Formal German");
}

#[tokio::test]
async fn relay_client_surfaces_upstream_rejection() {
    let (upstream, _) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = RelayClient::new(reqwest::Client::new(), &relay);
    let comparison = Comparator::new(client)
        .compare("bad", &comparison_request())
        .await
        .unwrap();
    assert!(comparison.baseline.is_error());
    assert_eq!(comparison.baseline, comparison.custom);
    assert_eq!(
        comparison.custom.error.as_deref(),
        Some("DeepL API error: Forbidden (status 403)")
    );
}

#[tokio::test]
async fn direct_gateway_talks_to_provider() {
    let (upstream, recorded) = spawn_upstream().await;
    let gateway = DeepL::new(reqwest::Client::new()).with_base_url(&upstream);
    let comparison = Comparator::new(gateway.clone())
        .compare("direct", &comparison_request())
        .await
        .unwrap();
    assert_eq!(comparison.custom.text, "HELLO (custom)");
    assert!(recorded
        .auth
        .lock()
        .unwrap()
        .iter()
        .all(|auth| auth == "DeepL-Auth-Key direct"));

    let err = gateway
        .list_style_rules("  ", StyleRulesQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::validation("API key is required"));
}
