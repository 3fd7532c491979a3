//! Peer and container URL handling.

use reqwest::Url;

use crate::error::{PlatformError, Result};

/// Canonical form of a platform URL: trimmed, surrounding quotes removed,
/// no trailing slash.
pub fn normalize_url(raw: &str) -> String {
    let mut s = raw.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            s = s[1..s.len() - 1].trim();
        }
    }
    s.trim_end_matches('/').to_string()
}

/// Reject anything that is not an absolute http(s) URL with a host.
pub fn check_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| PlatformError::invalid_input(format!("Invalid URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(PlatformError::invalid_input(format!(
                "Unsupported URL scheme '{}' in '{}'",
                other, url
            )))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(PlatformError::invalid_input(format!("URL '{}' has no host", url)));
    }
    Ok(())
}

/// Normalize and validate in one step.
pub fn parse_platform_url(raw: &str) -> Result<String> {
    let url = normalize_url(raw);
    check_url(&url)?;
    Ok(url)
}
