use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimit,
    Network,
    ContentPolicy,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    /// Resubmitting an identical prompt after a safety refusal is futile.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorCategory::ContentPolicy)
    }

    /// Severity applied on top of exponential backoff.
    pub fn delay_multiplier(self) -> f64 {
        match self {
            ErrorCategory::RateLimit | ErrorCategory::ContentPolicy => 2.0,
            ErrorCategory::Unknown => 1.0,
            ErrorCategory::Network | ErrorCategory::Timeout => 0.5,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Network => "network",
            ErrorCategory::ContentPolicy => "content_policy",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

// Substring matches. "rate" on its own is matched as a whole word instead,
// since it also occurs inside "generate" and "moderate".
const RATE_LIMIT_KEYWORDS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "rate_limit",
    "ratelimit",
    "rate limited",
    "too many requests",
    "429",
    "quota",
    "usage cap",
];

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out", "time out", "deadline exceeded"];

const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "fetch failed",
    "failed to fetch",
    "disconnected",
    "connection",
    "econnreset",
    "offline",
    "receiving end does not exist",
    "could not establish",
];

const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "policy violation",
    "usage policies",
    "violates",
    "safety",
    "inappropriate",
    "can't help with",
    "cannot help with",
    "can't assist",
    "cannot assist",
    "unable to help",
    "not able to help",
];

/// Classifies a raw failure message. Total and deterministic; falls back to
/// [`ErrorCategory::Unknown`].
pub fn categorize(message: &str) -> ErrorCategory {
    let lowered = message.to_lowercase();
    let matches_any = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));

    if matches_any(RATE_LIMIT_KEYWORDS) || has_word(&lowered, "rate") {
        ErrorCategory::RateLimit
    } else if matches_any(TIMEOUT_KEYWORDS) {
        ErrorCategory::Timeout
    } else if matches_any(NETWORK_KEYWORDS) {
        ErrorCategory::Network
    } else if matches_any(CONTENT_POLICY_KEYWORDS) {
        ErrorCategory::ContentPolicy
    } else {
        ErrorCategory::Unknown
    }
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_map_to_categories() {
        assert_eq!(categorize("HTTP 429 Too Many Requests"), ErrorCategory::RateLimit);
        assert_eq!(categorize("You've hit your usage QUOTA"), ErrorCategory::RateLimit);
        assert_eq!(categorize("Request timed out"), ErrorCategory::Timeout);
        assert_eq!(categorize("TypeError: Failed to fetch"), ErrorCategory::Network);
        assert_eq!(categorize("Port disconnected"), ErrorCategory::Network);
        assert_eq!(
            categorize("This request violates our content policy"),
            ErrorCategory::ContentPolicy
        );
        assert_eq!(categorize("send button not found"), ErrorCategory::Unknown);
        assert_eq!(categorize(""), ErrorCategory::Unknown);
    }

    #[test]
    fn generate_is_not_a_rate_limit() {
        assert_eq!(
            categorize("Failed to generate response"),
            ErrorCategory::Unknown
        );
        assert_eq!(
            categorize("Message flagged by moderate filter"),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn rate_as_a_word_is_a_rate_limit() {
        assert_eq!(
            categorize("Rate exceeded, please slow down"),
            ErrorCategory::RateLimit
        );
        assert_eq!(categorize("request rate: too high"), ErrorCategory::RateLimit);
    }

    #[test]
    fn classification_is_stable() {
        let message = "Network error: connection reset";
        let first = categorize(message);
        for _ in 0..5 {
            assert_eq!(categorize(message), first);
        }
    }

    #[test]
    fn only_content_policy_is_terminal() {
        assert!(!ErrorCategory::ContentPolicy.is_retryable());
        for category in [
            ErrorCategory::RateLimit,
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::Unknown,
        ] {
            assert!(category.is_retryable());
        }
    }
}
