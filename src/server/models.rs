use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct StyleRulesParams {
    pub(crate) detailed: Option<String>,
    pub(crate) page: Option<String>,
    pub(crate) page_size: Option<String>,
}

impl StyleRulesParams {
    /// Missing or empty values fall back to a detailed first page of 25.
    pub(crate) fn into_pairs(self) -> Vec<(String, String)> {
        vec![
            ("detailed".to_string(), or_default(self.detailed, "true")),
            ("page".to_string(), or_default(self.page, "0")),
            ("page_size".to_string(), or_default(self.page_size, "25")),
        ]
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<String>,
}
