//! URL heuristics applied before a bookmark reaches the engine

use url::Url;

/// Trim the input and prefix `https://` unless it already has an http(s) scheme.
///
/// Empty (or all-whitespace) input stays empty so callers can reject it.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Host without a leading `www.`; the raw input when it does not parse.
pub fn domain(url: &str) -> String {
    match host_of(url) {
        Some(host) => host.strip_prefix("www.").unwrap_or(&host).to_string(),
        None => url.to_string(),
    }
}

/// Favicon service URL for the bookmark's host, empty when unparsable
pub fn favicon_url(url: &str, size: u32) -> String {
    match host_of(url) {
        Some(host) => format!(
            "https://www.google.com/s2/favicons?domain={}&sz={}",
            host, size
        ),
        None => String::new(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Uppercase the first character of every word
fn capitalize_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_word = false;
    for c in input.chars() {
        if is_word_char(c) && !prev_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_word = is_word_char(c);
    }
    out
}

fn strip_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(idx) if idx + 1 < segment.len() => &segment[..idx],
        _ => segment,
    }
}

/// Guess a readable title from a normalized URL.
///
/// Uses the last path segment when there is one (`/posts/rust-async.html`
/// becomes `Rust Async`), otherwise the host without its top-level domain
/// (`www.example.com` becomes `Example`).
pub fn derive_title(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    let host = parsed.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host).to_string();
    let path = parsed.path().trim_end_matches('/');

    if !path.is_empty() {
        let last = path.rsplit('/').next().unwrap_or_default();
        let spaced = last.replace(['-', '_'], " ");
        let title = capitalize_words(strip_extension(&spaced)).trim().to_string();
        return if title.is_empty() { host } else { title };
    }

    let labels: Vec<&str> = host.split('.').collect();
    let name = labels[..labels.len().saturating_sub(1)].join(" ");
    let title = capitalize_words(&name);
    if title.is_empty() {
        host
    } else {
        title
    }
}
