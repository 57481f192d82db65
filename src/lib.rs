use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::Path;

pub mod compare;
pub mod diff;
pub mod error;
pub mod example_texts;
pub mod gateway;
pub mod generator;
pub mod languages;
pub mod logging;
mod paths;
pub mod server;
pub mod settings;
pub mod store;
pub mod style_rules;

pub use compare::{
    Comparator, Comparison, ComparisonRequest, ErrorMode, ResultBoard, TranslationResult,
};
pub use error::ApiError;
pub use gateway::{DeepL, Gateway, GatewayImpl, RelayClient, build_gateway};
pub use generator::{CategorizedInstruction, InstructionSelection, SpiceLevel};
pub use settings::Settings;
pub use store::{Configuration, FileStore, SettingsStore};
pub use style_rules::StyleRuleCatalog;

const API_KEY_ENV: &str = "DEEPL_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lang: String,
    pub source_lang: String,
    pub key: Option<String>,
    pub style_rule: Option<String>,
    pub instructions: Vec<String>,
    pub diff: bool,
    pub relay: Option<String>,
    pub settings_path: Option<String>,
    pub show_style_rules: bool,
    pub generate_instructions: bool,
    pub spice: SpiceLevel,
    pub show_settings: bool,
    pub save_settings: bool,
    pub proxy_url: Option<String>,
    pub debug_logs: Option<bool>,
    pub clear_settings: bool,
    pub example: Option<String>,
    pub list_examples: bool,
}

/// Everything one CLI invocation (or interactive session) works with:
/// layered settings, the saved configuration and the translation route.
pub struct Session {
    settings: Settings,
    store: FileStore,
    http: reqwest::Client,
    comparator: Comparator<GatewayImpl>,
    board: ResultBoard,
}

impl Session {
    pub fn open(settings_path: Option<&str>, relay: Option<&str>) -> Result<Self> {
        let settings = settings::load_settings(settings_path.map(Path::new))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("translate-compare/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "failed to build HTTP client")?;
        let gateway = build_gateway(http.clone(), &settings.upstream_base_url, relay);
        let comparator = Comparator::new(gateway).with_error_mode(settings.error_mode);
        Ok(Self {
            store: FileStore::new(paths::data_dir()),
            settings,
            http,
            comparator,
            board: ResultBoard::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn configuration(&self) -> Configuration {
        store::load_or_default(&self.store, &self.settings.generator.default_url)
    }

    pub fn resolve_key(&self, explicit: Option<&str>) -> Result<String> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        resolve_key(explicit, &self.configuration(), env_key.as_deref()).ok_or_else(|| {
            anyhow!(
                "no DeepL API key found (use --key, --save-settings --key or {})",
                API_KEY_ENV
            )
        })
    }

    /// Runs a comparison and publishes it. `None` means a newer comparison
    /// was published while this one was in flight.
    pub async fn compare(
        &self,
        key: &str,
        request: &ComparisonRequest,
    ) -> Result<Option<Comparison>, ApiError> {
        let comparison = self.comparator.compare(key, request).await?;
        if self.board.publish(comparison.clone()) {
            Ok(Some(comparison))
        } else {
            Ok(None)
        }
    }

    pub async fn fetch_style_rules(&self, key: &str) -> Result<Vec<gateway::StyleRule>, ApiError> {
        let response = self
            .comparator
            .gateway()
            .list_style_rules(key, gateway::StyleRulesQuery::default())
            .await?;
        Ok(response.style_rules)
    }

    pub async fn generate_instructions(
        &self,
        spice_level: SpiceLevel,
    ) -> Result<Vec<CategorizedInstruction>, ApiError> {
        let config = self.configuration();
        let endpoint = Some(config.openai_proxy_url.trim())
            .filter(|url| !url.is_empty())
            .unwrap_or(self.settings.generator.default_url.as_str());
        let request =
            generator::GenerateRequest::new(self.settings.instructions.max_length, spice_level);
        generator::generate(&self.http, endpoint, &request, &self.settings.generator).await
    }
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    if config.list_examples {
        return Ok(example_texts::format_example_list());
    }
    let session = Session::open(config.settings_path.as_deref(), config.relay.as_deref())?;

    if config.clear_settings {
        session.store().clear()?;
        return Ok(format!(
            "configuration cleared ({})",
            session.store().path().display()
        ));
    }
    if config.save_settings {
        let mut stored = session.configuration();
        if let Some(key) = config.key.as_deref() {
            stored.deepl_api_key = key.trim().to_string();
        }
        if let Some(url) = config.proxy_url.as_deref() {
            stored.openai_proxy_url = url.trim().to_string();
        }
        if let Some(debug) = config.debug_logs {
            stored.show_debug_logs = debug;
        }
        let saved = session.store().save(stored)?;
        return Ok(format_configuration(&saved, &session.store().path()));
    }
    if config.show_settings {
        return Ok(format_configuration(
            &session.configuration(),
            &session.store().path(),
        ));
    }
    if config.generate_instructions {
        let generated = session.generate_instructions(config.spice).await?;
        return Ok(format_generated(&generated));
    }
    if config.show_style_rules {
        let key = session.resolve_key(config.key.as_deref())?;
        let rules = session.fetch_style_rules(&key).await?;
        let mut catalog = StyleRuleCatalog::new();
        catalog.replace(rules);
        catalog.select(config.style_rule.as_deref())?;
        return Ok(format_catalog(&catalog));
    }

    let text = comparison_text(config.example.as_deref(), input)?;
    let request = build_request(&config, &text, session.settings())?;
    let key = session.resolve_key(config.key.as_deref())?;
    let show_debug = config
        .debug_logs
        .unwrap_or_else(|| session.configuration().show_debug_logs);
    let comparison = session
        .compare(&key, &request)
        .await?
        .ok_or_else(|| anyhow!("comparison was superseded"))?;
    Ok(format_comparison(
        &comparison,
        None,
        config.diff,
        show_debug,
    ))
}

/// A named example replaces whatever was piped in.
pub fn comparison_text(example: Option<&str>, input: Option<String>) -> Result<String> {
    if let Some(id) = example {
        return Ok(example_texts::find(id)?.text.to_string());
    }
    let input = input.unwrap_or_default();
    let text = input.trim();
    if text.is_empty() {
        return Err(anyhow!("stdin is empty"));
    }
    Ok(text.to_string())
}

/// `--key` wins, then the saved configuration, then the environment.
pub fn resolve_key(
    explicit: Option<&str>,
    stored: &Configuration,
    env_key: Option<&str>,
) -> Option<String> {
    [explicit, Some(stored.deepl_api_key.as_str()), env_key]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string)
}

fn build_request(config: &Config, text: &str, settings: &Settings) -> Result<ComparisonRequest> {
    let target_lang = languages::validate_target(&config.lang)?;
    let source_lang = languages::validate_source(&config.source_lang)?;
    let mut selection = InstructionSelection::new(settings.instructions);
    for instruction in &config.instructions {
        selection.add_manual(instruction)?;
    }
    Ok(ComparisonRequest {
        text: text.to_string(),
        source_lang: source_lang.to_string(),
        target_lang: target_lang.to_string(),
        style_rule_id: config.style_rule.clone(),
        instructions: selection.active(),
    })
}

/// Both results, an optional inline diff and, when debugging, the payloads.
pub fn format_comparison(
    comparison: &Comparison,
    style_rule_name: Option<&str>,
    with_diff: bool,
    with_debug: bool,
) -> String {
    let custom_payload = &comparison.payloads.custom;
    let instruction_count = custom_payload
        .custom_instructions
        .as_ref()
        .map(Vec::len)
        .unwrap_or(0);
    let style_rule = style_rule_name.or(custom_payload.style_rule_id.as_deref());

    let mut sections = vec![
        format!("Baseline\n{}", format_result(&comparison.baseline)),
        format!(
            "Custom ({})\n{}",
            describe_augmentation(style_rule, instruction_count),
            format_result(&comparison.custom)
        ),
    ];

    if with_diff && !comparison.baseline.is_error() && !comparison.custom.is_error() {
        let segments = diff::diff_words(&comparison.baseline.text, &comparison.custom.text);
        let body = if diff::has_changes(&segments) {
            diff::render_markers(&segments)
        } else {
            "(no differences)".to_string()
        };
        sections.push(format!("Diff\n{}", body));
    }

    if with_debug {
        sections.push(format!(
            "Debug (comparison #{}, {})\nbaseline request: {}\ncustom request: {}",
            comparison.id,
            format_duration(comparison.elapsed_ms),
            pretty(&display_payload(&comparison.payloads.baseline)),
            pretty(&display_payload(&comparison.payloads.custom)),
        ));
    }

    sections.join("\n\n")
}

fn format_result(result: &TranslationResult) -> String {
    if let Some(error) = result.error.as_deref() {
        return format!("error: {}", error);
    }
    match result.detected_source_language.as_deref() {
        Some(detected) => format!("{}\n(detected: {})", result.text, detected),
        None => result.text.clone(),
    }
}

/// "with \"Formal\" style rule + 2 custom instructions"
pub fn describe_augmentation(style_rule: Option<&str>, instruction_count: usize) -> String {
    if style_rule.is_none() && instruction_count == 0 {
        return "without style rules or custom instructions".to_string();
    }
    let mut description = match style_rule {
        Some(name) => format!("with \"{}\" style rule", name),
        None => "with no style rule".to_string(),
    };
    if instruction_count > 0 {
        description.push_str(&format!(
            " + {} custom instruction{}",
            instruction_count,
            if instruction_count > 1 { "s" } else { "" }
        ));
    }
    description
}

/// The payload as shown to users: the text array is summarized.
pub fn display_payload(payload: &gateway::TranslateRequest) -> Value {
    let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert(
            "text".to_string(),
            Value::String(format!("[{} text(s)]", payload.text.len())),
        );
    }
    value
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn format_duration(elapsed_ms: u64) -> String {
    if elapsed_ms < 1000 {
        format!("{}ms", elapsed_ms)
    } else {
        format!("{:.2}s", elapsed_ms as f64 / 1000.0)
    }
}

pub fn format_configuration(config: &Configuration, path: &Path) -> String {
    let key = if config.deepl_api_key.trim().is_empty() {
        "(none)".to_string()
    } else {
        mask_key(&config.deepl_api_key)
    };
    let proxy = if config.openai_proxy_url.trim().is_empty() {
        "(none)"
    } else {
        config.openai_proxy_url.as_str()
    };
    [
        format!("path: {}", path.display()),
        format!("deeplApiKey: {}", key),
        format!("openaiProxyUrl: {}", proxy),
        format!("showDebugLogs: {}", config.show_debug_logs),
        format!("lastUpdated: {}", config.last_updated),
        format!("configured: {}", config.is_configured()),
    ]
    .join("\n")
}

/// Keeps only the last four characters visible.
pub fn mask_key(key: &str) -> String {
    let key = key.trim();
    let count = key.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

pub fn format_generated(generated: &[CategorizedInstruction]) -> String {
    generated
        .iter()
        .enumerate()
        .map(|(index, item)| {
            format!(
                "{}. [{}] {}",
                index + 1,
                item.category.as_str(),
                item.instruction
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_catalog(catalog: &StyleRuleCatalog) -> String {
    if catalog.is_empty() {
        return "no style rules available".to_string();
    }
    catalog
        .rules()
        .iter()
        .map(|rule| {
            let selected = catalog.selected_id() == Some(rule.style_id.as_str());
            style_rules::format_rule(rule, selected)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
