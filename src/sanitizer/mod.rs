//! Input sanitization for user questions
//!
//! A best-effort heuristic filter, not a security boundary: it catches common
//! instruction-override and obfuscation phrasing before the question reaches
//! the generation service, which reduces but does not eliminate prompt
//! injection risk. The system policy of the answerer is the second line.

use crate::error::{ArchivistError, Result};
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Tag that prefixes every moderated question
pub const MODERATION_TAG: &str = "[SECURITY_MODERATED]";

/// Characters of the original input kept in a moderated question
const MODERATED_PREFIX_CHARS: usize = 100;

/// Built-in adversarial phrase patterns, matched case-insensitively
const BUILTIN_PATTERNS: &[&str] = &[
    r"ignore\s+(all\s+)?previous\s+instructions",
    r"system\s+prompt",
    r"developer\s+mode",
    r"new\s+role",
    r"you\s+are\s+now",
    r"output\s+the\s+full\s+prompt",
    r"base64",
    r"translate\s+to.*hex",
];

/// Result of inspecting one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    /// Source of the first pattern that matched, when the input was moderated
    pub matched: Option<String>,
}

impl Sanitized {
    pub fn is_moderated(&self) -> bool {
        self.matched.is_some()
    }
}

pub struct InputSanitizer {
    patterns: Vec<Regex>,
}

impl InputSanitizer {
    /// Built-in patterns plus `extra_patterns` from configuration
    pub fn new(extra_patterns: &[String]) -> Result<Self> {
        let sources = BUILTIN_PATTERNS
            .iter()
            .copied()
            .chain(extra_patterns.iter().map(String::as_str));

        let mut patterns = Vec::new();
        for source in sources {
            let regex = RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map_err(|e| ArchivistError::InvalidConfigValue {
                    path: "sanitizer.extra_patterns".to_string(),
                    message: format!("Invalid pattern '{}': {}", source, e),
                })?;
            patterns.push(regex);
        }

        Ok(Self { patterns })
    }

    pub fn sanitize(&self, raw: &str) -> String {
        self.inspect(raw).text
    }

    /// Moderate `raw` if any pattern matches, otherwise clean it
    ///
    /// Moderated input keeps its first 100 characters behind the moderation
    /// tag. Clean input loses control characters other than newline,
    /// carriage return and tab, and surrounding whitespace.
    pub fn inspect(&self, raw: &str) -> Sanitized {
        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(raw)) {
            warn!("Input moderated by pattern '{}'", pattern.as_str());
            let prefix: String = raw.chars().take(MODERATED_PREFIX_CHARS).collect();
            return Sanitized {
                text: format!("{} Requesting information about: {}", MODERATION_TAG, prefix),
                matched: Some(pattern.as_str().to_string()),
            };
        }

        let cleaned: String = raw
            .chars()
            .filter(|&c| c as u32 >= 32 || matches!(c, '\n' | '\r' | '\t'))
            .collect();

        Sanitized {
            text: cleaned.trim().to_string(),
            matched: None,
        }
    }
}
