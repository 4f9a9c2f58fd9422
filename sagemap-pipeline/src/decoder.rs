// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Best-effort JSON recovery from model output
//!
//! Chat models like to wrap JSON in prose or code fences. [`decode`] first
//! tries the whole text, then the span running from the first `[` or `{` to
//! the last matching closer. It never panics and returns `None` when neither
//! attempt yields JSON.

use serde_json::Value;

/// Longest slice of raw model text quoted in log lines
const LOG_PREVIEW_CHARS: usize = 200;

/// Decode raw model text into a JSON value
pub fn decode(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(value);
    }

    let span = bracketed_span(raw)?;
    serde_json::from_str::<Value>(span).ok()
}

/// Greedy span from the earliest opener that has a closer after it to the
/// last occurrence of that closer.
fn bracketed_span(text: &str) -> Option<&str> {
    let last_square = text.rfind(']');
    let last_curly = text.rfind('}');

    for (start, ch) in text.char_indices() {
        let end = match ch {
            '[' => last_square.filter(|&end| end > start),
            '{' => last_curly.filter(|&end| end > start),
            _ => continue,
        };
        if let Some(end) = end {
            return Some(&text[start..=end]);
        }
    }

    None
}

/// Short prefix of `raw` for diagnostics
pub(crate) fn preview(raw: &str) -> String {
    if raw.chars().count() <= LOG_PREVIEW_CHARS {
        return raw.to_string();
    }
    let cut: String = raw.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}
