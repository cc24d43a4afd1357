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

//! Layout-driven BCS decoding for Sui calls.
//!
//! Sui transactions name their target through
//! `additional_fields.{module_name, function, state_obj}`; the registry maps
//! `module::function` to a field layout, and the payload decodes field by
//! field from BCS bytes into simple, address, or byte-vector parameters.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::{
    error::DecodeError,
    proposal::ProposalTransaction,
    tree::{DecodedCall, DecodedParameter},
};

/// Fixed-width BCS primitives a layout field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Unsigned 64-bit.
    U64,
    /// Unsigned 128-bit.
    U128,
    /// Canonical BCS bool.
    Bool,
}

impl SimpleType {
    fn type_name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::Bool => "bool",
        }
    }
}

/// The three field shapes a Sui layout distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiFieldKind {
    /// A fixed-width primitive.
    Simple(SimpleType),
    /// A 32-byte Sui address.
    Address,
    /// A length-prefixed byte vector.
    Bytes,
}

/// One named field in a call layout.
#[derive(Debug, Clone)]
pub struct SuiFieldLayout {
    /// Field name.
    pub name: String,
    /// Field shape.
    pub kind: SuiFieldKind,
}

impl SuiFieldLayout {
    /// Creates a named field of the given shape.
    pub fn new(name: impl Into<String>, kind: SuiFieldKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Argument layout of one `module::function`.
#[derive(Debug, Clone)]
pub struct SuiCallLayout {
    /// Move module name.
    pub module_name: String,
    /// Entry function name.
    pub function: String,
    /// Argument fields in encoding order.
    pub fields: Vec<SuiFieldLayout>,
}

impl SuiCallLayout {
    /// Creates a layout for `module::function`.
    pub fn new(
        module_name: impl Into<String>,
        function: impl Into<String>,
        fields: Vec<SuiFieldLayout>,
    ) -> Self {
        Self { module_name: module_name.into(), function: function.into(), fields }
    }
}

/// Layout registry keyed by `(module, function)`.
#[derive(Debug, Default)]
pub struct SuiRegistry {
    layouts: HashMap<(String, String), SuiCallLayout>,
}

impl SuiRegistry {
    /// Registers a call layout, replacing any previous one for the pair.
    pub fn register(&mut self, layout: SuiCallLayout) {
        self.layouts.insert((layout.module_name.clone(), layout.function.clone()), layout);
    }

    fn resolve(&self, module_name: &str, function: &str) -> Option<&SuiCallLayout> {
        self.layouts.get(&(module_name.to_string(), function.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SuiAdditionalFields {
    module_name: String,
    function: String,
    #[serde(default)]
    #[allow(dead_code)]
    state_obj: Option<String>,
}

/// Decoder for Sui transactions.
#[derive(Debug, Default)]
pub struct SuiDecoder {
    registry: SuiRegistry,
}

impl SuiDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut SuiRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        let fields: SuiAdditionalFields = tx.parse_additional_fields().ok_or_else(|| {
            DecodeError::AdditionalFields("expected {module_name, function, state_obj}".into())
        })?;
        let layout = self.registry.resolve(&fields.module_name, &fields.function).ok_or_else(
            || {
                DecodeError::UnknownContractType(format!(
                    "{}::{}",
                    fields.module_name, fields.function
                ))
            },
        )?;

        let mut reader = BcsReader::new(&tx.data);
        let inputs = layout
            .fields
            .iter()
            .map(|field| reader.read_field(field))
            .collect::<Result<Vec<_>, _>>()?;
        reader.finish()?;

        Ok(DecodedCall {
            contract_type: tx.contract_type.clone(),
            address: tx.to.clone(),
            method_name: layout.function.clone(),
            inputs,
            outputs: Vec::new(),
            data: tx.data.clone(),
            additional_fields: tx.additional_fields.clone(),
        })
    }
}

/// Incremental reader over BCS bytes.
///
/// Fixed-width primitives defer to the `bcs` crate for canonical decoding;
/// only the ULEB128 length prefix of byte vectors is read by hand, because
/// `bcs` has no mid-stream API.
struct BcsReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BcsReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len()).ok_or(
            DecodeError::ShortCalldata(self.data.len()),
        )?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_primitive<T: serde::de::DeserializeOwned>(
        &mut self,
        width: usize,
    ) -> Result<T, DecodeError> {
        let bytes = self.take(width)?;
        bcs::from_bytes(bytes).map_err(|err| DecodeError::Arguments(err.to_string()))
    }

    fn read_uleb128(&mut self) -> Result<usize, DecodeError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 28 {
                return Err(DecodeError::Arguments("sequence length overflows u32".into()));
            }
        }
        Ok(value as usize)
    }

    fn read_field(&mut self, field: &SuiFieldLayout) -> Result<DecodedParameter, DecodeError> {
        match field.kind {
            SuiFieldKind::Simple(simple) => {
                let (value, display) = match simple {
                    SimpleType::U8 => {
                        let v: u8 = self.read_primitive(1)?;
                        (json!(v), v.to_string())
                    }
                    SimpleType::U16 => {
                        let v: u16 = self.read_primitive(2)?;
                        (json!(v), v.to_string())
                    }
                    SimpleType::U32 => {
                        let v: u32 = self.read_primitive(4)?;
                        (json!(v), v.to_string())
                    }
                    SimpleType::U64 => {
                        let v: u64 = self.read_primitive(8)?;
                        (json!(v), v.to_string())
                    }
                    SimpleType::U128 => {
                        let v: u128 = self.read_primitive(16)?;
                        (json!(v.to_string()), v.to_string())
                    }
                    SimpleType::Bool => {
                        let v: bool = self.read_primitive(1)?;
                        (json!(v), v.to_string())
                    }
                };
                Ok(DecodedParameter::new(field.name.clone(), simple.type_name(), value)
                    .with_display(display))
            }
            SuiFieldKind::Address => {
                let bytes = self.take(32)?;
                let display = format!("0x{}", hex::encode(bytes));
                Ok(DecodedParameter::new(field.name.clone(), "address", json!(display.clone()))
                    .with_display(display))
            }
            SuiFieldKind::Bytes => {
                let len = self.read_uleb128()?;
                let bytes = self.take(len)?;
                let display = format!("0x{}", hex::encode(bytes));
                Ok(DecodedParameter::new(
                    field.name.clone(),
                    "vector<u8>",
                    json!(display.clone()),
                )
                .with_display(display))
            }
        }
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.pos != self.data.len() {
            return Err(DecodeError::Arguments(format!(
                "{} trailing bytes after last field",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}
