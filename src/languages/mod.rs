use crate::error::ApiError;

/// Source value that lets the provider detect the input language.
pub const AUTO_DETECT: &str = "auto";

/// Target languages that accept custom instructions.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("de", "German"),
    ("en", "English"),
    ("en-US", "English (US)"),
    ("en-GB", "English (UK)"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("zh-Hans", "Chinese (Simplified)"),
    ("zh-Hant", "Chinese (Traditional)"),
];

pub fn is_auto_detect(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_DETECT)
}

/// Returns the canonical spelling of a supported code (`en-us` -> `en-US`).
pub fn canonical_code(code: &str) -> Option<&'static str> {
    let code = code.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(known, _)| *known)
}

pub fn language_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

pub fn validate_target(code: &str) -> Result<&'static str, ApiError> {
    canonical_code(code).ok_or_else(|| {
        ApiError::validation(format!(
            "unsupported target language '{}' (expected one of: {})",
            code.trim(),
            supported_codes()
        ))
    })
}

/// Accepts `auto` or any supported target code.
pub fn validate_source(code: &str) -> Result<&'static str, ApiError> {
    if is_auto_detect(code) {
        return Ok(AUTO_DETECT);
    }
    canonical_code(code).ok_or_else(|| {
        ApiError::validation(format!(
            "unsupported source language '{}' (expected auto or one of: {})",
            code.trim(),
            supported_codes()
        ))
    })
}

fn supported_codes() -> String {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, _)| *code)
        .collect::<Vec<_>>()
        .join(", ")
}
