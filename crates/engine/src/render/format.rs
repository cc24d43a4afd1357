// MPA - Multichain Proposal Analyzer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
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

//! The formatter catalogue.
//!
//! A `value_type` annotation selects how a parameter value is rendered:
//! `ethereum.address`, `ethereum.uint256`, `hex`, or `truncate:<n>`.
//! Severity and risk symbols and the `first6…last4` address shortening used
//! by the text format live here too.

use serde_json::Value;

/// Applies a `value_type` formatter to a raw value.
///
/// Unknown formatter names fall back to the plain display of the value.
pub fn format_value(value_type: &str, value: &Value) -> String {
    if let Some(len) = value_type.strip_prefix("truncate:").and_then(|n| n.parse().ok()) {
        return truncate(&plain_display(value), len);
    }
    match value_type {
        "ethereum.address" => format_ethereum_address(&plain_display(value)),
        "ethereum.uint256" => format_ethereum_uint256(&plain_display(value)),
        "hex" => format_hex(value),
        _ => plain_display(value),
    }
}

/// Lower-case hex, left-zero-padded to 40 hex chars, `0x` prefix.
pub fn format_ethereum_address(raw: &str) -> String {
    let digits = raw.strip_prefix("0x").unwrap_or(raw).to_lowercase();
    format!("0x{digits:0>40}")
}

/// Decimal string with comma thousands-separators; sign preserved.
pub fn format_ethereum_uint256(raw: &str) -> String {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

/// `0x`-prefixed hex of bytes or integers.
pub fn format_hex(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(n) => format!("{n:#x}"),
            None => n.to_string(),
        },
        Value::String(s) if s.starts_with("0x") => s.clone(),
        Value::String(s) => match s.parse::<u128>() {
            Ok(n) => format!("{n:#x}"),
            Err(_) => format!("0x{}", hex::encode(s.as_bytes())),
        },
        other => plain_display(other),
    }
}

/// Truncates to `len` total characters, appending `...` when shortened.
pub fn truncate(raw: &str, len: usize) -> String {
    if raw.chars().count() <= len {
        return raw.to_string();
    }
    let kept = len.saturating_sub(3);
    let cut: String = raw.chars().take(kept).collect();
    format!("{cut}...")
}

/// Shortens `0x`-prefixed values longer than 12 chars to `first6…last4`.
pub fn truncate_address(raw: &str) -> String {
    if !raw.starts_with("0x") || raw.chars().count() <= 12 {
        return raw.to_string();
    }
    let head: String = raw.chars().take(6).collect();
    let tail: String = raw.chars().skip(raw.chars().count() - 4).collect();
    format!("{head}…{tail}")
}

/// Symbol for a `severity` annotation value.
pub fn severity_symbol(severity: &str) -> &'static str {
    match severity {
        "error" => "✗",
        "warning" => "⚠",
        "info" => "ℹ",
        "debug" => "⚙",
        _ => "",
    }
}

/// Symbol for a `risk` annotation value.
pub fn risk_symbol(risk: &str) -> &'static str {
    match risk {
        "high" => "🔴",
        "medium" => "🟡",
        "low" => "🟢",
        _ => "",
    }
}

/// Plain one-line display of a JSON value; strings render unquoted.
pub fn plain_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
