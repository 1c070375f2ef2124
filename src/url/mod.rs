use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};

/// A URL list as uploaded by the user: one URL per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlList {
    /// Accepted URLs in first-seen order, without duplicates.
    pub urls: Vec<String>,
    pub rejected: Vec<RejectedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedLine {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Check that `input` is an absolute http(s) URL with a host.
///
/// The trimmed input is returned as-is so it still matches the page keys
/// Search Console reports.
pub fn validate_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let url = url::Url::parse(trimmed).map_err(|e| Error::UrlParse(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::UrlParse(format!(
            "unsupported scheme '{}': {trimmed}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::UrlParse(format!("missing host: {trimmed}")));
    }
    Ok(trimmed.to_string())
}

/// Parse a newline-separated URL list. Blank lines and `#` comments are
/// skipped.
pub fn parse_url_list(text: &str) -> UrlList {
    let mut list = UrlList::default();
    let mut seen = HashSet::new();

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match validate_url(trimmed) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    list.urls.push(url);
                }
            }
            Err(e) => {
                log::warn!("skipping line {}: {e}", i + 1);
                list.rejected.push(RejectedLine {
                    line: i + 1,
                    text: trimmed.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    list
}
