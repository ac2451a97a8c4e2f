//! Hour-bucketed index names.
//!
//! `machine-sensor` at 2024-05-01T09:42Z becomes `machine-sensor-2024-05-01-09`.
//! Output always satisfies Elasticsearch index naming rules: lowercase only,
//! none of `\ / * ? " < > | , # :` or whitespace, no leading `-`, `_` or `+`,
//! at most 255 bytes.

use chrono::{DateTime, TimeZone, Utc};

pub const BUCKET_FORMAT: &str = "%Y-%m-%d-%H";

const MAX_INDEX_NAME_BYTES: usize = 255;
const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ':'];
const FORBIDDEN_LEADING: &[char] = &['-', '_', '+'];

/// Hour bucket key for `now`, e.g. `2024-05-01-09`.
pub fn bucket_key(now: DateTime<Utc>) -> String {
    now.format(BUCKET_FORMAT).to_string()
}

pub fn bucketed_name(base: &str, now: DateTime<Utc>) -> String {
    let key = bucket_key(now);
    let base = sanitize(base);
    if base.is_empty() {
        return key;
    }
    let budget = MAX_INDEX_NAME_BYTES.saturating_sub(key.len() + 1);
    format!("{}-{}", truncate_on_char_boundary(&base, budget), key)
}

/// [`bucketed_name`] for the current hour.
pub fn hourly_index_name(base: &str) -> String {
    bucketed_name(base, Utc::now())
}

/// [`bucketed_name`] for the hour containing `unix_ms`, such as a reading's
/// emission timestamp. Values chrono cannot represent fall back to now.
pub fn bucketed_name_at_millis(base: &str, unix_ms: u64) -> String {
    let at = i64::try_from(unix_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    bucketed_name(base, at)
}

fn sanitize(base: &str) -> String {
    let cleaned: String = base
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_whitespace() || FORBIDDEN.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned.trim_start_matches(FORBIDDEN_LEADING).to_string()
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
