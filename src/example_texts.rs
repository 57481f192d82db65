use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleCategory {
    Business,
    Casual,
    Technical,
    Creative,
}

impl ExampleCategory {
    pub fn label(self) -> &'static str {
        match self {
            ExampleCategory::Business => "Business",
            ExampleCategory::Casual => "Casual",
            ExampleCategory::Technical => "Technical",
            ExampleCategory::Creative => "Creative",
        }
    }
}

pub fn category_label(category: ExampleCategory) -> &'static str {
    category.label()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleText {
    pub id: &'static str,
    pub category: ExampleCategory,
    pub text: &'static str,
}

/// Sample inputs that can stand in for typed text.
pub const EXAMPLE_TEXTS: &[ExampleText] = &[
    ExampleText {
        id: "business-1",
        category: ExampleCategory::Business,
        text: "We are pleased to announce our Q4 earnings exceeded expectations. Our revenue grew 25% year-over-year, driven by strong performance in our enterprise segment.",
    },
    ExampleText {
        id: "casual-1",
        category: ExampleCategory::Casual,
        text: "Hey! Just wanted to let you know the party is this Saturday at 8pm. Bring your favorite snacks and we'll have a great time!",
    },
    ExampleText {
        id: "technical-1",
        category: ExampleCategory::Technical,
        text: "The API endpoint accepts POST requests with a JSON payload. Authentication is required via the Authorization header using Bearer token format.",
    },
    ExampleText {
        id: "creative-1",
        category: ExampleCategory::Creative,
        text: "As the sun dipped below the horizon, painting the sky in shades of amber and rose, she realized this was just the beginning of her journey.",
    },
    ExampleText {
        id: "business-2",
        category: ExampleCategory::Business,
        text: "Please review the attached proposal and provide your feedback by end of day Friday. We need to finalize the contract before the board meeting next week.",
    },
    ExampleText {
        id: "casual-2",
        category: ExampleCategory::Casual,
        text: "Can't believe how fast this year went by! Looking forward to catching up with you soon. Let me know when you're free for coffee.",
    },
    ExampleText {
        id: "technical-2",
        category: ExampleCategory::Technical,
        text: "The application implements a microservices architecture with containerized deployments. Each service communicates via RESTful APIs with JWT authentication.",
    },
    ExampleText {
        id: "creative-2",
        category: ExampleCategory::Creative,
        text: "The old bookstore stood quietly at the corner, its windows filled with stories waiting to be discovered by curious souls passing by.",
    },
];

const PREVIEW_CHARS: usize = 50;

pub fn find(id: &str) -> Result<&'static ExampleText, ApiError> {
    let id = id.trim();
    EXAMPLE_TEXTS
        .iter()
        .find(|example| example.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| {
            let known = EXAMPLE_TEXTS
                .iter()
                .map(|example| example.id)
                .collect::<Vec<_>>()
                .join(", ");
            ApiError::validation(format!(
                "unknown example '{}' (expected one of: {})",
                id, known
            ))
        })
}

/// One line per example: id, category label and the opening words.
pub fn format_example_list() -> String {
    EXAMPLE_TEXTS
        .iter()
        .map(|example| {
            format!(
                "{}\t{} - {}",
                example.id,
                category_label(example.category),
                preview(example.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut head = text.chars().take(PREVIEW_CHARS).collect::<String>();
    head.push_str("...");
    head
}
