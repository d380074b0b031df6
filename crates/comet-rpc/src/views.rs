//! Typed views over validated replies.
//!
//! A view only reads fields the catalogue already checked, so conversion can
//! only fail on values outside a closed set (an unknown IO type code, say).

use comet_types::{IoType, PositionType};

use crate::error::ValidationError;
use crate::schema::{FieldValue, Record, RpcReply};

fn missing(field: &str) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
}

fn enum_code<E>(field: &str, code: i64, expected: &'static str) -> Result<E, ValidationError>
where
    E: TryFrom<u16>,
{
    u16::try_from(code)
        .ok()
        .and_then(|c| E::try_from(c).ok())
        .ok_or_else(|| ValidationError::UnexpectedType {
            field: field.to_string(),
            expected,
            found: code.to_string(),
        })
}

/// One IO port read (IOVALRD, IOSIM, IOCKSIM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoPortValue {
    pub io_type: Option<IoType>,
    pub index: Option<i64>,
    pub value: i64,
}

impl TryFrom<&RpcReply> for IoPortValue {
    type Error = ValidationError;

    fn try_from(reply: &RpcReply) -> Result<Self, Self::Error> {
        let io_type = reply
            .int("type")
            .map(|code| enum_code("type", code, "IO type code"))
            .transpose()?;
        Ok(Self {
            io_type,
            index: reply.int("index"),
            value: reply.int("value").ok_or_else(|| missing("value"))?,
        })
    }
}

/// One element of an IOGTALL reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoPortState {
    pub index: i64,
    pub value: i64,
    pub simulated: bool,
    pub comment: String,
}

impl TryFrom<&Record> for IoPortState {
    type Error = ValidationError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let int = |name: &str| record.get(name).and_then(FieldValue::as_int);
        Ok(Self {
            index: int("index").ok_or_else(|| missing("index"))?,
            value: int("val").ok_or_else(|| missing("val"))?,
            simulated: record
                .get("sim")
                .and_then(FieldValue::as_bool)
                .ok_or_else(|| missing("sim"))?,
            comment: record
                .get("comment")
                .and_then(FieldValue::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

impl IoPortState {
    /// All port states in an IOGTALL reply.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` if the reply has no `value` list.
    pub fn list_from(reply: &RpcReply) -> Result<Vec<Self>, ValidationError> {
        reply
            .list("value")
            .ok_or_else(|| missing("value"))?
            .iter()
            .map(Self::try_from)
            .collect()
    }
}

/// A variable as read by VMIP_READVA. The value is the controller's own
/// rendering, as it would appear in a `.VA` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    pub prog_name: Option<String>,
    pub var_name: Option<String>,
    pub type_code: Option<i64>,
    pub value: String,
}

impl TryFrom<&RpcReply> for VariableValue {
    type Error = ValidationError;

    fn try_from(reply: &RpcReply) -> Result<Self, Self::Error> {
        Ok(Self {
            prog_name: reply.str("prog_name").map(str::to_string),
            var_name: reply.str("var_name").map(str::to_string),
            type_code: reply.int("type_code"),
            value: reply
                .str("value")
                .ok_or_else(|| missing("value"))?
                .to_string(),
        })
    }
}

/// Numeric register contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterNumber {
    Int(i64),
    Real(f64),
}

impl RegisterNumber {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            RegisterNumber::Int(n) => n as f64,
            RegisterNumber::Real(x) => x,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterValue {
    pub value: RegisterNumber,
    pub type_code: Option<i64>,
    pub comment: Option<String>,
}

impl TryFrom<&RpcReply> for RegisterValue {
    type Error = ValidationError;

    fn try_from(reply: &RpcReply) -> Result<Self, Self::Error> {
        let value = match reply.get("value") {
            Some(FieldValue::Int(n)) => RegisterNumber::Int(*n),
            Some(FieldValue::Number(x)) => RegisterNumber::Real(*x),
            _ => return Err(missing("value")),
        };
        Ok(Self {
            value,
            type_code: reply.int("type"),
            comment: reply.str("comment").map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRegister {
    pub position_type: Option<PositionType>,
    pub comment: Option<String>,
    /// Position as the controller renders it.
    pub value: String,
}

impl TryFrom<&RpcReply> for PositionRegister {
    type Error = ValidationError;

    fn try_from(reply: &RpcReply) -> Result<Self, Self::Error> {
        let position_type = reply
            .int("type")
            .map(|code| enum_code("type", code, "position type code"))
            .transpose()?;
        Ok(Self {
            position_type,
            comment: reply.str("comment").map(str::to_string),
            value: reply
                .str("value")
                .ok_or_else(|| missing("value"))?
                .to_string(),
        })
    }
}

/// File contents from GET_RAW_FILE, one decoded buffer per line entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFile {
    pub lines: Vec<Vec<u8>>,
}

impl RawFile {
    /// All buffers back to back.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines.concat()
    }
}

impl TryFrom<&RpcReply> for RawFile {
    type Error = ValidationError;

    fn try_from(reply: &RpcReply) -> Result<Self, Self::Error> {
        let lines = reply
            .list("lines")
            .ok_or_else(|| missing("lines"))?
            .iter()
            .enumerate()
            .map(|(i, line)| {
                line.get("buf")
                    .and_then(FieldValue::as_bytes)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| missing(&format!("lines[{i}].buf")))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { lines })
    }
}
