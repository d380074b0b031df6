//! Response normalization.
//!
//! The controller's JSON is not always well formed. Before decoding, the raw
//! body runs through a [`RepairPolicy`]: an ordered list of [`Repair`] rules,
//! each of which either leaves the text alone or returns a rewritten copy.
//! Rules only cover malformations that have actually been observed; anything
//! else reaches the decoder untouched and fails there.
//!
//! The content type of the response is never consulted. The controller labels
//! its JSON as `text/html`.
//!
//! Every built-in rule is idempotent, so normalizing already normalized text
//! returns it unchanged.

use std::borrow::Cow;
use std::fmt;

use serde::de::IgnoredAny;
use serde_json::{Value, json};
use tracing::warn;

use crate::catalogue::RpcSpec;
use crate::error::MalformedResponse;
use crate::protocol::{FANUC_KEY, RPC_KEY};

/// What a rule may know about the call that produced the response.
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    pub rpc: &'a str,
    pub rpc_id: Option<u16>,
    /// Whether an empty `RPC` list may be read as "succeeded".
    pub tolerates_empty_reply: bool,
}

impl<'a> RepairContext<'a> {
    #[must_use]
    pub fn new(rpc: &'a str, spec: &RpcSpec) -> Self {
        Self {
            rpc,
            rpc_id: spec.id,
            tolerates_empty_reply: spec.tolerates_empty_reply,
        }
    }
}

/// A single repair heuristic.
pub trait Repair: Send + Sync + fmt::Debug {
    /// Stable name, used for logging and for removing rules from a policy.
    fn name(&self) -> &'static str;

    /// Return `Ok(None)` when the rule does not apply to `text`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` when the rule recognises the malformation
    /// but the call is not allowed to have it repaired.
    fn repair(
        &self,
        text: &str,
        ctx: &RepairContext<'_>,
    ) -> Result<Option<String>, MalformedResponse>;
}

const EMPTY_RPC_LIST: &str = r#""RPC":]}}"#;

/// `{"FANUC":{"name":"..","fastclock":"..","RPC":]}}`
///
/// Seen for IOVALSET (R-30iB+, V9.30), IOUNSIM (V9.40) and VMIP_WRITEVA
/// (V8.30). The reference client treats the call as successful. For RPCs the
/// catalogue marks as tolerant, the list is replaced with a single OK element;
/// for all others the response is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRpcList;

impl Repair for EmptyRpcList {
    fn name(&self) -> &'static str {
        "empty-rpc-list"
    }

    fn repair(
        &self,
        text: &str,
        ctx: &RepairContext<'_>,
    ) -> Result<Option<String>, MalformedResponse> {
        if !text.contains(EMPTY_RPC_LIST) {
            return Ok(None);
        }
        if !ctx.tolerates_empty_reply {
            return Err(MalformedResponse::EmptyRpcList {
                rpc: ctx.rpc.to_string(),
            });
        }

        let element = match ctx.rpc_id {
            Some(id) => format!(r#"{{"rpc":"{id}","status":"0x0"}}"#),
            None => r#"{"status":"0x0"}"#.to_string(),
        };
        let patched = format!(r#""{RPC_KEY}":[{element}]}}}}"#);
        Ok(Some(text.replace(EMPTY_RPC_LIST, &patched)))
    }
}

/// A complete JSON document followed by stray bytes (NULs, a second closing
/// brace). Keeps the first document; trailing whitespace alone is not a
/// malformation and is left in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingGarbage;

impl Repair for TrailingGarbage {
    fn name(&self) -> &'static str {
        "trailing-garbage"
    }

    fn repair(
        &self,
        text: &str,
        _ctx: &RepairContext<'_>,
    ) -> Result<Option<String>, MalformedResponse> {
        let mut stream = serde_json::Deserializer::from_str(text).into_iter::<IgnoredAny>();
        let Some(Ok(_)) = stream.next() else {
            return Ok(None);
        };

        let end = stream.byte_offset();
        if text[end..].chars().all(char::is_whitespace) {
            return Ok(None);
        }
        Ok(Some(text[..end].to_string()))
    }
}

/// An RPC element sent without the `FANUC` envelope around it. Only objects
/// carrying a `status` field qualify.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareElement;

impl Repair for BareElement {
    fn name(&self) -> &'static str {
        "bare-element"
    }

    fn repair(
        &self,
        text: &str,
        _ctx: &RepairContext<'_>,
    ) -> Result<Option<String>, MalformedResponse> {
        let Ok(Value::Object(element)) = serde_json::from_str::<Value>(text) else {
            return Ok(None);
        };
        if element.contains_key(FANUC_KEY) || !element.contains_key("status") {
            return Ok(None);
        }

        let wrapped = json!({ FANUC_KEY: { RPC_KEY: [Value::Object(element)] } });
        Ok(Some(serde_json::to_string(&wrapped)?))
    }
}

/// Ordered set of repair rules applied to every response body.
#[derive(Debug)]
pub struct RepairPolicy {
    rules: Vec<Box<dyn Repair>>,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RepairPolicy {
    /// The built-in rules, in the order they must run: the empty-list patch
    /// has to come first because its input is not parseable JSON.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(EmptyRpcList),
                Box::new(TrailingGarbage),
                Box::new(BareElement),
            ],
        }
    }

    /// No repairs: every body is decoded exactly as received.
    #[must_use]
    pub fn strict() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it runs after all existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Repair + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Drop every rule named `name`.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.rules.retain(|rule| rule.name() != name);
        self
    }

    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Run all rules over `text`.
    ///
    /// # Errors
    ///
    /// Returns the first `MalformedResponse` a rule raises.
    pub fn normalize<'t>(
        &self,
        text: &'t str,
        ctx: &RepairContext<'_>,
    ) -> Result<Cow<'t, str>, MalformedResponse> {
        let mut current = Cow::Borrowed(text);
        for rule in &self.rules {
            if let Some(repaired) = rule.repair(&current, ctx)? {
                warn!(
                    rule = rule.name(),
                    rpc = ctx.rpc,
                    "Repaired malformed COMET response"
                );
                current = Cow::Owned(repaired);
            }
        }
        Ok(current)
    }
}
