//! COMET request and response envelopes.
//!
//! Requests are a function name plus named arguments, carried as the query
//! string of a GET to `/COMET/rpc`. Responses wrap a single RPC element:
//!
//! ```text
//! {"FANUC":{"name":"ROBOT","fastclock":"1234","RPC":[{"rpc":"62","status":"0x0",...}]}}
//! ```

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use comet_types::{IoType, PasteLineOper, RemarkLineOper};

use crate::error::{Error, MalformedResponse};

pub const RPC_PATH: &str = "/COMET/rpc";
pub const FUNC_PARAM: &str = "func";
pub const FANUC_KEY: &str = "FANUC";
pub const RPC_KEY: &str = "RPC";

/// Everything but RFC 3986 unreserved characters is quoted. In particular a
/// space becomes `%20`, never `+`, which the controller does not decode.
const COMET_QUOTE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(n) => write!(f, "{n}"),
            // Debug keeps the fractional part ("1.0"), matching how the
            // controller's .VA files render reals.
            ArgValue::Float(x) => write!(f, "{x:?}"),
            ArgValue::Str(s) => f.write_str(s),
        }
    }
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArgValue {
                fn from(n: $t) -> Self {
                    ArgValue::Int(i64::from(n))
                }
            }
        )*
    };
}

arg_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for ArgValue {
    fn from(x: f64) -> Self {
        ArgValue::Float(x)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<IoType> for ArgValue {
    fn from(t: IoType) -> Self {
        ArgValue::Int(i64::from(t.code()))
    }
}

impl From<PasteLineOper> for ArgValue {
    fn from(op: PasteLineOper) -> Self {
        ArgValue::Int(i64::from(op.code()))
    }
}

impl From<RemarkLineOper> for ArgValue {
    fn from(op: RemarkLineOper) -> Self {
        ArgValue::Int(i64::from(op.code()))
    }
}

/// One COMET invocation: function name plus ordered, named arguments.
///
/// The name is not checked against the catalogue; the controller decides
/// what it supports. An argument with an empty name is sent anonymously
/// (`&=value`), which RPRINTF requires.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    name: String,
    args: Vec<(String, ArgValue)>,
}

impl RpcRequest {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn anonymous(self, value: impl Into<ArgValue>) -> Self {
        self.arg("", value)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn args(&self) -> &[(String, ArgValue)] {
        &self.args
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Check the request can be sent at all.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the function name is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRequest("RPC name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Render as the percent-quoted query string (without the leading `?`).
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut query = format!("{FUNC_PARAM}={}", quote(&self.name));
        for (name, value) in &self.args {
            query.push('&');
            query.push_str(&quote(name));
            query.push('=');
            query.push_str(&quote(&value.to_string()));
        }
        query
    }

    /// The request as a flat JSON object: `{"func": NAME, ...args}`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for RpcRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.args.len() + 1))?;
        map.serialize_entry(FUNC_PARAM, &self.name)?;
        for (name, value) in &self.args {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn quote(s: &str) -> String {
    utf8_percent_encode(s, COMET_QUOTE).to_string()
}

/// A decoded `{"FANUC": {...}}` response document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Controller host name, when reported.
    pub name: Option<String>,
    /// Controller clock tick; the controller quotes it, so it is kept as-is.
    pub fastclock: Option<Value>,
    /// The single RPC element.
    pub element: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Decode normalized response text.
    ///
    /// `name` and `fastclock` may be missing; duplicate keys resolve to the
    /// last occurrence.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the text is not JSON, is not exactly a
    /// `FANUC` envelope, or does not carry exactly one RPC element.
    pub fn decode(text: &str) -> Result<Self, MalformedResponse> {
        let value: Value = serde_json::from_str(text)?;

        let Value::Object(mut top) = value else {
            return Err(MalformedResponse::MissingEnvelope);
        };
        if top.len() != 1 {
            return Err(MalformedResponse::MissingEnvelope);
        }
        let Some(Value::Object(mut body)) = top.remove(FANUC_KEY) else {
            return Err(MalformedResponse::MissingEnvelope);
        };

        let Some(Value::Array(mut elements)) = body.remove(RPC_KEY) else {
            return Err(MalformedResponse::MissingRpcList);
        };
        if elements.len() != 1 {
            return Err(MalformedResponse::ElementCount(elements.len()));
        }
        let Some(Value::Object(element)) = elements.pop() else {
            return Err(MalformedResponse::ElementNotObject);
        };

        let name = match body.remove("name") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        Ok(Self {
            name,
            fastclock: body.remove("fastclock"),
            element,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_starts_with_func() {
        let req = RpcRequest::new("IOVALRD")
            .arg("type", IoType::DigitalOut)
            .arg("index", 1);
        assert_eq!(req.to_query(), "func=IOVALRD&type=2&index=1");
    }

    #[test]
    fn test_query_quotes_spaces_as_percent20() {
        let req = RpcRequest::new("CPKCL").arg("kcl_cmd", "show var $version");
        assert_eq!(req.to_query(), "func=CPKCL&kcl_cmd=show%20var%20%24version");
    }

    #[test]
    fn test_query_quotes_reserved_characters() {
        let req = RpcRequest::new("GTFILIST").arg("path_name", "md:\\*.ls");
        assert_eq!(req.to_query(), "func=GTFILIST&path_name=md%3A%5C%2A.ls");

        let req = RpcRequest::new("VMIP_READVA").arg("var_name", "$MCR.$GENOVERRIDE[1]");
        assert_eq!(
            req.to_query(),
            "func=VMIP_READVA&var_name=%24MCR.%24GENOVERRIDE%5B1%5D"
        );
    }

    #[test]
    fn test_query_anonymous_argument() {
        let req = RpcRequest::new("RPRINTF").anonymous("hello world");
        assert_eq!(req.to_query(), "func=RPRINTF&=hello%20world");
    }

    #[test]
    fn test_query_float_keeps_fraction() {
        let req = RpcRequest::new("VMIP_WRITEVA").arg("value", 1.0);
        assert_eq!(req.to_query(), "func=VMIP_WRITEVA&value=1.0");
    }

    #[test]
    fn test_request_json_is_flat() {
        let req = RpcRequest::new("DPREAD")
            .arg("dict_name", "TPAR")
            .arg("ele_no", 3);
        let value = req.to_json().unwrap();
        assert_eq!(
            value,
            json!({"func": "DPREAD", "dict_name": "TPAR", "ele_no": 3})
        );
    }

    #[test]
    fn test_request_keeps_argument_order() {
        let req = RpcRequest::new("TXSETLIN")
            .arg("prog_name", "MAIN")
            .arg("line_num", 4);
        let names: Vec<&str> = req.args().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["prog_name", "line_num"]);
        assert_eq!(req.get("line_num"), Some(&ArgValue::Int(4)));
        assert_eq!(req.get("missing"), None);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(
            RpcRequest::new("").validate(),
            Err(Error::InvalidRequest(_))
        ));
        assert!(RpcRequest::new("  ").validate().is_err());
    }

    #[test]
    fn test_unknown_name_is_accepted() {
        assert!(RpcRequest::new("NOT_A_REAL_RPC").validate().is_ok());
    }

    #[test]
    fn test_decode_envelope() {
        let text = r#"{"FANUC":{"name":"ROBOT","fastclock":"42","RPC":[{"rpc":"62","status":"0x0","value":"1"}]}}"#;
        let env = ResponseEnvelope::decode(text).unwrap();
        assert_eq!(env.name.as_deref(), Some("ROBOT"));
        assert_eq!(env.fastclock, Some(json!("42")));
        assert_eq!(env.element["value"], json!("1"));
    }

    #[test]
    fn test_decode_tolerates_missing_envelope_fields() {
        let env = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":[{"status":0}]}}"#).unwrap();
        assert!(env.name.is_none());
        assert!(env.fastclock.is_none());
    }

    #[test]
    fn test_decode_duplicate_keys_last_wins() {
        let env =
            ResponseEnvelope::decode(r#"{"FANUC":{"RPC":[{"status":4,"status":0}]}}"#).unwrap();
        assert_eq!(env.element["status"], json!(0));
    }

    #[test]
    fn test_decode_rejects_missing_fanuc() {
        let err = ResponseEnvelope::decode(r#"{"OTHER":{"RPC":[]}}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::MissingEnvelope));

        let err = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":[]},"extra":1}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::MissingEnvelope));

        let err = ResponseEnvelope::decode("[1,2]").unwrap_err();
        assert!(matches!(err, MalformedResponse::MissingEnvelope));
    }

    #[test]
    fn test_decode_rejects_bad_rpc_list() {
        let err = ResponseEnvelope::decode(r#"{"FANUC":{"name":"R"}}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::MissingRpcList));

        let err = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":[{"status":0},{"status":0}]}}"#)
            .unwrap_err();
        assert!(matches!(err, MalformedResponse::ElementCount(2)));

        let err = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":[]}}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::ElementCount(0)));

        let err = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":["x"]}}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::ElementNotObject));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = ResponseEnvelope::decode(r#"{"FANUC":{"RPC":]}}"#).unwrap_err();
        assert!(matches!(err, MalformedResponse::Json(_)));
    }
}
