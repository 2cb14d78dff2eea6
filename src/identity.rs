//! Display-name resolution for raw host records.
//!
//! The host reports an absolute target path, which is empty for some records
//! (not yet assigned, or host self-test entries). The resolver prefers the last
//! path segment, falls back to the URL, and rejects the placeholder strings the
//! host writes when it probes its own download configuration.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::host::HostDownload;

/// Phrases the host uses in self-test download names.
///
/// A candidate containing any of them is never shown as a file name.
pub const SELF_TEST_PLACEHOLDERS: [&str; 6] = [
    "请点击取消",
    "这是Chrono在测试下载配置",
    "Chrono",
    "测试下载配置",
    "请确保关闭浏览器另存为对话框",
    "默认下载路径为可写入的",
];

/// Last URL path segment that contains a dot, up to the query string.
#[allow(clippy::expect_used)]
static URL_FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([^/]+\.[^/?]+)(?:\?|$)").expect("URL filename regex is valid") // Static pattern, safe to panic
});

/// Resolves the display name for a raw host record.
///
/// Returns `None` when no usable name exists; such records are host noise and
/// must be excluded from the ledger.
#[must_use]
pub fn resolve(raw: &HostDownload) -> Option<String> {
    resolve_name(&raw.filename, &raw.url)
}

/// Resolves a display name from a host path and source URL.
#[must_use]
pub fn resolve_name(path: &str, url: &str) -> Option<String> {
    let candidate = filename_from_path(path).or_else(|| filename_from_url(url))?;

    if is_self_test_placeholder(&candidate) {
        trace!(candidate = %candidate, "Discarding host self-test placeholder name");
        return filename_from_url(url);
    }

    Some(candidate)
}

/// Returns true if `name` contains a known host self-test phrase.
#[must_use]
pub fn is_self_test_placeholder(name: &str) -> bool {
    SELF_TEST_PLACEHOLDERS
        .iter()
        .any(|phrase| name.contains(phrase))
}

/// Last segment of a host path, split on both separator styles.
#[must_use]
pub fn filename_from_path(path: &str) -> Option<String> {
    if path.trim().is_empty() {
        return None;
    }
    let last = path.rsplit(['/', '\\']).next()?.trim();
    (!last.is_empty()).then(|| last.to_string())
}

/// Extracts a file name from a URL.
///
/// Tries the dotted last segment before any query string first, then a plain
/// split on `/` with the query stripped.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }

    if let Some(captures) = URL_FILENAME_PATTERN.captures(url)
        && let Some(name) = captures.get(1)
    {
        return Some(name.as_str().to_string());
    }

    let last = url.rsplit('/').next().unwrap_or_default();
    if !last.contains('.') {
        return None;
    }
    let name = last.split('?').next().unwrap_or_default();
    (!name.is_empty()).then(|| name.to_string())
}
