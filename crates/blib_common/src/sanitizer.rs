//! Redaction of credentials and personal data before logging.
//!
//! Remote error bodies and websocket URLs can echo back access tokens or the
//! user's e-mail address; everything the sync layer logs from the wire goes
//! through [`LogSanitizer::sanitize`].

use regex::Regex;
use std::sync::OnceLock;

static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();

fn compile(pattern: &str, replacement: &str) -> Option<(Regex, String)> {
    Regex::new(pattern)
        .ok()
        .map(|re| (re, replacement.to_string()))
}

pub struct LogSanitizer {
    patterns: Vec<(Regex, String)>,
}

impl LogSanitizer {
    pub fn new() -> Self {
        let patterns = PATTERNS.get_or_init(|| {
            [
                (
                    r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
                    "***@***.***",
                ),
                // Bearer header values
                (r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+", "${1}***"),
                // Bare JWTs (header.payload.signature)
                (
                    r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
                    "***.jwt.***",
                ),
                // Credentials in query strings
                (
                    r"(?i)([?&](?:apikey|access_token|token)=)[^&\s]+",
                    "${1}***",
                ),
            ]
            .iter()
            .filter_map(|(pattern, replacement)| compile(pattern, replacement))
            .collect()
        });

        Self {
            patterns: patterns.clone(),
        }
    }

    pub fn sanitize(&self, message: &str) -> String {
        let mut result = message.to_string();
        for (pattern, replacement) in &self.patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }
        result
    }
}

impl Default for LogSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize with the shared pattern set
pub fn sanitize(message: &str) -> String {
    LogSanitizer::new().sanitize(message)
}
