use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::gateway::StyleRule;

/// The fetched style rules plus which one, if any, is active. The collection
/// is only ever replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct StyleRuleCatalog {
    rules: Vec<StyleRule>,
    selected: Option<String>,
}

impl StyleRuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Swaps in a new collection; a selection that vanished is cleared.
    pub fn replace(&mut self, rules: Vec<StyleRule>) {
        self.rules = rules;
        if let Some(selected) = self.selected.as_deref()
            && self.find(selected).is_none()
        {
            self.selected = None;
        }
    }

    pub fn select(&mut self, id: Option<&str>) -> Result<(), ApiError> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            self.selected = None;
            return Ok(());
        };
        if self.find(id).is_none() {
            return Err(ApiError::validation(format!("unknown style rule '{}'", id)));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&StyleRule> {
        self.selected.as_deref().and_then(|id| self.find(id))
    }

    pub fn find(&self, id: &str) -> Option<&StyleRule> {
        self.rules.iter().find(|rule| rule.style_id == id)
    }
}

/// `style_and_tone` -> `Style And Tone`.
pub fn format_parameter_name(name: &str) -> String {
    name.split(['_', '-'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flattens configured parameter groups into `Name: value` lines.
pub fn format_rule_config(config: &BTreeMap<String, Value>) -> Vec<String> {
    let mut lines = Vec::new();
    for group in config.values() {
        let Value::Object(params) = group else {
            continue;
        };
        for (param, value) in params {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            lines.push(format!("{}: {}", format_parameter_name(param), value));
        }
    }
    lines
}

pub fn format_rule(rule: &StyleRule, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    let mut output = format!(
        "{} {}\t{}\t{}\tv{}",
        marker, rule.style_id, rule.name, rule.language, rule.version
    );
    if let Some(config) = rule.configured_rules.as_ref() {
        for line in format_rule_config(config) {
            output.push_str("\n    ");
            output.push_str(&line);
        }
    }
    if let Some(instructions) = rule.custom_instructions.as_ref() {
        if !instructions.prompt.trim().is_empty() {
            output.push_str(&format!(
                "\n    Instruction ({}): {}",
                instructions.label, instructions.prompt
            ));
        }
    }
    output
}
