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

//! Projections of decoded Solidity values.
//!
//! The decoder turns calldata into [`DynSolValue`] trees; the rest of the
//! pipeline never touches alloy types. This module provides the two
//! projections it needs instead: a lossless JSON form (large integers become
//! decimal strings) stored on decoded parameters, and a compact one-line
//! display form used for render-ready `display_value` fields.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::hex;
use serde_json::{json, Value};

/// Converts a decoded Solidity value into its JSON projection.
///
/// Integers wider than 64 bits are emitted as decimal strings so no
/// precision is lost on the way through `serde_json`. Addresses and byte
/// blobs become `0x`-prefixed hex strings. Structs with property names
/// become objects; bare tuples become arrays.
pub fn sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => json!(b),
        DynSolValue::Int(n, _) => json!(n.to_string()),
        DynSolValue::Uint(n, _) => json!(n.to_string()),
        DynSolValue::Address(addr) => json!(format!("0x{addr:040x}")),
        DynSolValue::Function(f) => json!(format!("0x{}", hex::encode(f.as_slice()))),
        DynSolValue::FixedBytes(bytes, size) => json!(format!("0x{}", hex::encode(&bytes[..*size]))),
        DynSolValue::Bytes(bytes) => json!(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => json!(s),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            Value::Array(items.iter().map(sol_value_to_json).collect())
        }
        DynSolValue::Tuple(items) => Value::Array(items.iter().map(sol_value_to_json).collect()),
        DynSolValue::CustomStruct { prop_names, tuple, .. } => {
            if prop_names.len() == tuple.len() {
                let fields = prop_names
                    .iter()
                    .cloned()
                    .zip(tuple.iter().map(sol_value_to_json))
                    .collect();
                Value::Object(fields)
            } else {
                Value::Array(tuple.iter().map(sol_value_to_json).collect())
            }
        }
    }
}

/// Formats a decoded Solidity value for one-line display.
///
/// Long byte blobs and strings are elided; aggregates print at most a few
/// leading elements followed by a count.
pub fn format_sol_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(n, _) => n.to_string(),
        DynSolValue::Uint(n, _) => n.to_string(),
        DynSolValue::Address(addr) => format!("0x{addr:040x}"),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f.as_slice())),
        DynSolValue::FixedBytes(bytes, size) => format!("0x{}", hex::encode(&bytes[..*size])),
        DynSolValue::Bytes(bytes) => {
            if bytes.len() <= 32 {
                format!("0x{}", hex::encode(bytes))
            } else {
                format!("0x{}… ({} bytes)", hex::encode(&bytes[..16]), bytes.len())
            }
        }
        DynSolValue::String(s) => {
            if s.len() <= 64 {
                format!("\"{}\"", s.replace('"', "\\\""))
            } else {
                format!("\"{}…\" ({} chars)", &s[..32].replace('"', "\\\""), s.len())
            }
        }
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format_items(items, "[", "]"),
        DynSolValue::Tuple(items) => format_items(items, "(", ")"),
        DynSolValue::CustomStruct { prop_names, tuple, .. } => {
            if prop_names.len() == tuple.len() {
                let fields: Vec<String> = prop_names
                    .iter()
                    .zip(tuple.iter())
                    .map(|(name, item)| format!("{name}: {}", format_sol_value(item)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            } else {
                format_items(tuple, "(", ")")
            }
        }
    }
}

/// Returns the Solidity type name of a decoded value.
pub fn sol_type_name(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(_) => "bool".into(),
        DynSolValue::Int(_, bits) => format!("int{bits}"),
        DynSolValue::Uint(_, bits) => format!("uint{bits}"),
        DynSolValue::Address(_) => "address".into(),
        DynSolValue::Function(_) => "function".into(),
        DynSolValue::FixedBytes(_, size) => format!("bytes{size}"),
        DynSolValue::Bytes(_) => "bytes".into(),
        DynSolValue::String(_) => "string".into(),
        DynSolValue::Array(items) => match items.first() {
            Some(first) => format!("{}[]", sol_type_name(first)),
            None => "unknown[]".into(),
        },
        DynSolValue::FixedArray(items) => match items.first() {
            Some(first) => format!("{}[{}]", sol_type_name(first), items.len()),
            None => format!("unknown[{}]", items.len()),
        },
        DynSolValue::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(sol_type_name).collect();
            format!("({})", parts.join(","))
        }
        DynSolValue::CustomStruct { name, .. } => name.clone(),
    }
}

/// Renders named fields as an indented YAML-like block.
///
/// Used by the non-EVM decoders for multi-line `display_value` payloads.
pub fn yaml_block(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

const MAX_INLINE_ITEMS: usize = 4;

fn format_items(items: &[DynSolValue], open: &str, close: &str) -> String {
    if items.is_empty() {
        return format!("{open}{close}");
    }
    if items.len() <= MAX_INLINE_ITEMS {
        let parts: Vec<String> = items.iter().map(format_sol_value).collect();
        format!("{open}{}{close}", parts.join(", "))
    } else {
        let parts: Vec<String> = items.iter().take(3).map(format_sol_value).collect();
        format!("{open}{}, … ({} items){close}", parts.join(", "), items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    #[test]
    fn test_uint_json_projection_is_lossless() {
        let value = DynSolValue::Uint(U256::from(10).pow(U256::from(18)), 256);
        assert_eq!(sol_value_to_json(&value), json!("1000000000000000000"));
    }

    #[test]
    fn test_address_display_is_padded_hex() {
        let value = DynSolValue::Address(Address::repeat_byte(0xab));
        let display = format_sol_value(&value);
        assert_eq!(display, format!("0x{}", "ab".repeat(20)));
        assert_eq!(sol_type_name(&value), "address");
    }

    #[test]
    fn test_struct_projects_to_object() {
        let value = DynSolValue::CustomStruct {
            name: "RateLimiterConfig".into(),
            prop_names: vec!["isEnabled".into(), "capacity".into()],
            tuple: vec![DynSolValue::Bool(true), DynSolValue::Uint(U256::from(100), 256)],
        };
        let json = sol_value_to_json(&value);
        assert_eq!(json, json!({"isEnabled": true, "capacity": "100"}));
        assert_eq!(format_sol_value(&value), "{isEnabled: true, capacity: 100}");
    }

    #[test]
    fn test_long_array_display_is_elided() {
        let items: Vec<DynSolValue> =
            (0..8).map(|i| DynSolValue::Uint(U256::from(i), 256)).collect();
        let display = format_sol_value(&DynSolValue::Array(items));
        assert_eq!(display, "[0, 1, 2, … (8 items)]");
    }

    #[test]
    fn test_yaml_block_layout() {
        let block = yaml_block(&[
            ("instruction".into(), "setConfig".into()),
            ("multisig_id".into(), "0x01".into()),
        ]);
        assert_eq!(block, "instruction: setConfig\nmultisig_id: 0x01");
    }
}
