//! Typed result fields.
//!
//! The controller is loose about JSON types: integers arrive quoted, reals
//! arrive as strings, booleans as `0`/`1`. Each catalogue entry describes its
//! result fields with [`FieldSpec`]s, and [`coerce`] turns the raw JSON into a
//! [`FieldValue`] of the declared type or reports which field was wrong.

use std::collections::BTreeMap;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

use comet_types::ErrorCode;

use crate::error::ValidationError;

/// URL-safe alphabet; the controller sometimes drops padding.
const RAW_FILE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Declared type of a result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    /// Integer or real.
    Number,
    Str,
    Bool,
    /// Base64 payload.
    Bytes,
    /// Array of records, each described by the nested specs.
    List(&'static [FieldSpec]),
}

impl FieldType {
    fn label(self) -> &'static str {
        match self {
            FieldType::Int => "integer",
            FieldType::Number => "number",
            FieldType::Str => "string",
            FieldType::Bool => "bool",
            FieldType::Bytes => "base64 string",
            FieldType::List(_) => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Number(f64),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<Record>),
}

impl FieldValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Number(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Coerced fields keyed by name.
pub type Record = BTreeMap<String, FieldValue>;

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "real",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(path: &str, ty: FieldType, value: &Value) -> ValidationError {
    let found = match value {
        Value::String(s) => format!("string {s:?}"),
        other => json_type_name(other).to_string(),
    };
    ValidationError::UnexpectedType {
        field: path.to_string(),
        expected: ty.label(),
        found,
    }
}

/// Coerce `value` to `ty`. `path` names the field in errors.
///
/// # Errors
///
/// Returns `ValidationError::UnexpectedType` (or `MissingField` for a nested
/// record) when the value does not fit.
pub fn coerce(path: &str, ty: FieldType, value: &Value) -> Result<FieldValue, ValidationError> {
    let coerced = match (ty, value) {
        (FieldType::Int, Value::Number(n)) => n.as_i64().map(FieldValue::Int),
        (FieldType::Int, Value::String(s)) => s.trim().parse().ok().map(FieldValue::Int),

        (FieldType::Number, Value::Number(n)) => Some(
            n.as_i64()
                .map_or_else(|| FieldValue::Number(n.as_f64().unwrap_or(f64::NAN)), FieldValue::Int),
        ),
        (FieldType::Number, Value::String(s)) => parse_number(s.trim()),

        (FieldType::Str, Value::String(s)) => Some(FieldValue::Str(s.clone())),

        (FieldType::Bool, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
        (FieldType::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(FieldValue::Bool(false)),
            Some(1) => Some(FieldValue::Bool(true)),
            _ => None,
        },
        (FieldType::Bool, Value::String(s)) => parse_bool(s.trim()).map(FieldValue::Bool),

        (FieldType::Bytes, Value::String(s)) => {
            RAW_FILE_ENGINE.decode(s.trim()).ok().map(FieldValue::Bytes)
        }

        (FieldType::List(specs), Value::Array(items)) => {
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                let Value::Object(map) = item else {
                    return Err(unexpected(&item_path, FieldType::List(specs), item));
                };
                records.push(coerce_record(Some(&item_path), specs, map)?);
            }
            Some(FieldValue::List(records))
        }

        _ => None,
    };

    coerced
        .filter(|v| !matches!(v, FieldValue::Number(x) if !x.is_finite()))
        .ok_or_else(|| unexpected(path, ty, value))
}

fn parse_number(s: &str) -> Option<FieldValue> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(FieldValue::Int(n));
    }
    s.parse::<f64>().ok().map(FieldValue::Number)
}

fn parse_bool(s: &str) -> Option<bool> {
    if s == "1" || s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s == "0" || s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Coerce every declared field of `map`. Undeclared fields are ignored.
///
/// # Errors
///
/// Returns the first missing required field or mistyped field, in
/// declaration order.
pub fn coerce_record(
    prefix: Option<&str>,
    specs: &[FieldSpec],
    map: &Map<String, Value>,
) -> Result<Record, ValidationError> {
    let mut record = Record::new();
    for spec in specs {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", spec.name),
            None => spec.name.to_string(),
        };
        match map.get(spec.name) {
            None | Some(Value::Null) if spec.required => {
                return Err(ValidationError::MissingField { field: path });
            }
            None | Some(Value::Null) => {}
            Some(value) => {
                record.insert(spec.name.to_string(), coerce(&path, spec.ty, value)?);
            }
        }
    }
    Ok(record)
}

/// Parse a status field. The controller sends `"0x0"`-style hex strings,
/// sometimes bare integers, and occasionally hex without the prefix.
///
/// # Errors
///
/// Returns `ValidationError::UnexpectedType` if the value is neither.
pub fn parse_status(field: &str, value: &Value) -> Result<ErrorCode, ValidationError> {
    let code = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            u32::from_str_radix(digits, 16).ok()
        }
        _ => None,
    };
    code.map(ErrorCode).ok_or_else(|| ValidationError::UnexpectedType {
        field: field.to_string(),
        expected: "status code",
        found: match value {
            Value::String(s) => format!("string {s:?}"),
            other => json_type_name(other).to_string(),
        },
    })
}

/// Parse the `rpc` id field: a quoted integer, or a bare one.
///
/// # Errors
///
/// Returns `ValidationError::UnexpectedType` if the value is not an integer.
pub fn parse_rpc_id(value: &Value) -> Result<i64, ValidationError> {
    match coerce("rpc", FieldType::Int, value)? {
        FieldValue::Int(n) => Ok(n),
        _ => Err(unexpected("rpc", FieldType::Int, value)),
    }
}

/// A successful, validated RPC reply.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReply {
    pub rpc: String,
    pub status: ErrorCode,
    /// Declared result fields, coerced.
    pub fields: Record,
    /// The element as received (after repairs), including undeclared fields.
    pub raw: Map<String, Value>,
}

impl RpcReply {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    #[must_use]
    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(FieldValue::as_bytes)
    }

    #[must_use]
    pub fn list(&self, name: &str) -> Option<&[Record]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    /// An undeclared field, untouched.
    #[must_use]
    pub fn raw_field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}
