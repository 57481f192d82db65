use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compare::ErrorMode;
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const BASE_URL_ENV: &str = "DEEPL_BASE_URL";

#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream_base_url: String,
    pub generator: GeneratorSettings,
    pub instructions: InstructionLimits,
    pub server_addr: String,
    pub error_mode: ErrorMode,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub default_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionLimits {
    pub max_length: usize,
    pub max_count: usize,
    pub max_selected: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://api.deepl.com".to_string(),
            generator: GeneratorSettings::default(),
            instructions: InstructionLimits::default(),
            server_addr: "127.0.0.1:3000".to_string(),
            error_mode: ErrorMode::Shared,
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            default_url: String::new(),
            model: "gpt-4.1".to_string(),
            max_tokens: 1000,
        }
    }
}

impl Default for InstructionLimits {
    fn default() -> Self {
        Self {
            max_length: 300,
            max_count: 10,
            max_selected: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    upstream: Option<UpstreamSection>,
    generator: Option<GeneratorSection>,
    instructions: Option<InstructionsSection>,
    server: Option<ServerSection>,
    compare: Option<CompareSection>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamSection {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorSection {
    default_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InstructionsSection {
    max_length: Option<usize>,
    max_count: Option<usize>,
    max_selected: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompareSection {
    error_mode: Option<String>,
}

/// Loads the embedded defaults, then every settings file that exists in
/// order: working directory, data directory, and finally `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    let data_dir = paths::data_dir();
    ordered_paths.push(data_dir.join("settings.toml"));
    ordered_paths.push(data_dir.join("settings.local.toml"));

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = load_layers(&ordered_paths)?;
    if let Some(base_url) = env_value(BASE_URL_ENV) {
        settings.upstream_base_url = base_url;
    }
    Ok(settings)
}

pub(crate) fn load_layers(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults)?;

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(upstream) = incoming.upstream {
            if let Some(base_url) = upstream.base_url {
                if !base_url.trim().is_empty() {
                    self.upstream_base_url = base_url.trim().trim_end_matches('/').to_string();
                }
            }
        }
        if let Some(generator) = incoming.generator {
            if let Some(url) = generator.default_url {
                self.generator.default_url = url.trim().trim_end_matches('/').to_string();
            }
            if let Some(model) = generator.model {
                if !model.trim().is_empty() {
                    self.generator.model = model;
                }
            }
            if let Some(tokens) = generator.max_tokens {
                if tokens > 0 {
                    self.generator.max_tokens = tokens;
                }
            }
        }
        if let Some(limits) = incoming.instructions {
            if let Some(length) = limits.max_length {
                // Truncation keeps room for the "..." marker.
                if length > 3 {
                    self.instructions.max_length = length;
                }
            }
            if let Some(count) = limits.max_count {
                if count > 0 {
                    self.instructions.max_count = count;
                }
            }
            if let Some(selected) = limits.max_selected {
                if selected > 0 {
                    self.instructions.max_selected = selected;
                }
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr;
                }
            }
        }
        if let Some(compare) = incoming.compare {
            if let Some(mode) = compare.error_mode {
                self.error_mode = mode.parse()?;
            }
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
}
