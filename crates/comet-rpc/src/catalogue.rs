//! The RPC catalogue.
//!
//! Each supported RPC is one declarative [`RpcSpec`]: its name, the numeric id
//! the controller echoes back, the arguments it takes, the fields its reply
//! carries, and what its status codes mean. [`validate`] runs any decoded RPC
//! element against a spec; nothing in this module is specific to one RPC.

use serde_json::{Map, Value};
use tracing::warn;

use comet_types::{ErrorCode, IoType, codes};

use crate::error::{Fault, Result, RpcError, ValidationError};
use crate::protocol::{ArgValue, RpcRequest};
use crate::schema::{
    FieldSpec, FieldType, RpcReply, coerce_record, parse_rpc_id, parse_status,
};

/// What kind of value an argument carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Int,
    Str,
    /// An [`IoType`] code.
    IoType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    /// Empty for the anonymous argument RPRINTF takes.
    pub name: &'static str,
    pub kind: ArgKind,
}

const fn int(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        kind: ArgKind::Int,
    }
}

const fn text(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        kind: ArgKind::Str,
    }
}

const fn io_type(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        kind: ArgKind::IoType,
    }
}

/// A status code with an RPC-specific meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultRule {
    pub code: ErrorCode,
    pub fault: Fault,
}

const fn fault(code: ErrorCode, fault: Fault) -> FaultRule {
    FaultRule { code, fault }
}

/// A field other than `status` that reports the outcome of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusField {
    pub field: &'static str,
    pub faults: &'static [FaultRule],
}

/// Declarative description of one RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcSpec {
    pub name: &'static str,
    /// The id echoed in the reply's `rpc` field, when known.
    pub id: Option<u16>,
    pub args: &'static [ArgSpec],
    pub fields: &'static [FieldSpec],
    pub faults: &'static [FaultRule],
    pub status_fields: &'static [StatusField],
    /// The controller may answer with an empty `RPC` list on success.
    pub tolerates_empty_reply: bool,
}

impl RpcSpec {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            id: None,
            args: &[],
            fields: &[],
            faults: &[],
            status_fields: &[],
            tolerates_empty_reply: false,
        }
    }

    const fn id(mut self, id: u16) -> Self {
        self.id = Some(id);
        self
    }

    const fn args(mut self, args: &'static [ArgSpec]) -> Self {
        self.args = args;
        self
    }

    const fn fields(mut self, fields: &'static [FieldSpec]) -> Self {
        self.fields = fields;
        self
    }

    const fn faults(mut self, faults: &'static [FaultRule]) -> Self {
        self.faults = faults;
        self
    }

    const fn status_fields(mut self, status_fields: &'static [StatusField]) -> Self {
        self.status_fields = status_fields;
        self
    }

    const fn tolerates_empty_reply(mut self) -> Self {
        self.tolerates_empty_reply = true;
        self
    }

    /// Meaning of `code` for this RPC.
    #[must_use]
    pub fn fault_for(&self, code: ErrorCode) -> Option<Fault> {
        lookup_fault(self.faults, code)
    }
}

fn lookup_fault(rules: &[FaultRule], code: ErrorCode) -> Option<Fault> {
    rules.iter().find(|r| r.code == code).map(|r| r.fault)
}

/// Status-only contract used for names the catalogue does not know.
pub static GENERIC: RpcSpec = RpcSpec::new("");

const IO_PORT_ARGS: &[ArgSpec] = &[io_type("type"), int("index")];

const IO_FAULTS: &[FaultRule] = &[
    fault(codes::PRIO_001, Fault::InvalidIoType),
    fault(codes::PRIO_002, Fault::InvalidIoIndex),
];

const IO_VALUE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("value", FieldType::Int),
    FieldSpec::optional("type", FieldType::Int),
    FieldSpec::optional("index", FieldType::Int),
];

const VALUE_STR: &[FieldSpec] = &[FieldSpec::required("value", FieldType::Str)];

const IO_PORT_STATE: &[FieldSpec] = &[
    FieldSpec::required("index", FieldType::Int),
    FieldSpec::required("val", FieldType::Int),
    FieldSpec::required("sim", FieldType::Bool),
    FieldSpec::required("comment", FieldType::Str),
];

const RAW_FILE_LINE: &[FieldSpec] = &[FieldSpec::required("buf", FieldType::Bytes)];

const VARIABLE_FAULTS: &[FaultRule] = &[
    fault(codes::VARS_006, Fault::UnknownVariable),
    fault(codes::VARS_011, Fault::NoDataDefinedForProgram),
    fault(codes::VARS_024, Fault::BadVariableOrRegisterIndex),
];

const PROGRAM_FAULTS: &[FaultRule] = &[fault(codes::MEMO_073, Fault::ProgramDoesNotExist)];

/// Every RPC with a known contract.
pub static CATALOGUE: &[RpcSpec] = &[
    RpcSpec::new("CHGOVRD").args(&[int("ovrd_val")]),
    RpcSpec::new("CPKCL").id(87).args(&[text("kcl_cmd")]),
    RpcSpec::new("DPEWRITE_STR")
        .id(83)
        .args(&[int("ercode")])
        .fields(VALUE_STR)
        .faults(&[fault(codes::DICT_005, Fault::DictElementNotFound)]),
    RpcSpec::new("DPREAD")
        .id(148)
        .args(&[text("dict_name"), int("ele_no")])
        .fields(VALUE_STR)
        .faults(&[
            fault(codes::DICT_004, Fault::DictNotFound),
            fault(codes::DICT_005, Fault::DictElementNotFound),
        ]),
    RpcSpec::new("GET_RAW_FILE")
        .id(251)
        .args(&[text("file")])
        .fields(&[FieldSpec::required(
            "lines",
            FieldType::List(RAW_FILE_LINE),
        )]),
    RpcSpec::new("GTFILIST")
        .id(234)
        .args(&[text("path_name")])
        .fields(VALUE_STR),
    RpcSpec::new("GTMCRLST"),
    RpcSpec::new("GTPIDLST")
        .args(&[text("prog_name")])
        .faults(PROGRAM_FAULTS),
    RpcSpec::new("IOASGLOG")
        .args(&[
            io_type("log_port_type"),
            int("fst_log_port"),
            int("n_log_ports"),
            int("rack_no"),
            int("slot_no"),
            io_type("phy_port_type"),
            int("fst_phy_port"),
        ])
        .status_fields(&[StatusField {
            field: "asg_stat",
            faults: &[
                fault(codes::PRIO_007, Fault::NoSuchAssignment),
                fault(codes::PRIO_011, Fault::AssignmentOverlaps),
            ],
        }]),
    // Answered with IOVALRD's id, so no id check.
    RpcSpec::new("IOCKSIM")
        .args(IO_PORT_ARGS)
        .fields(IO_VALUE_FIELDS)
        .faults(&[
            fault(codes::PRIO_001, Fault::InvalidIoType),
            fault(codes::PRIO_002, Fault::InvalidIoIndex),
            fault(codes::PRIO_023, Fault::NoPortsOfThisType),
        ]),
    RpcSpec::new("IODEFPN")
        .id(68)
        .args(&[io_type("type"), int("index"), text("comment")])
        .faults(IO_FAULTS),
    RpcSpec::new("IODRYRUN"),
    RpcSpec::new("IOGETASG").args(&[io_type("type")]),
    RpcSpec::new("IOGETHDB"),
    RpcSpec::new("IOGETPN")
        .id(67)
        .args(IO_PORT_ARGS)
        .fields(VALUE_STR)
        .faults(&[
            fault(codes::PRIO_001, Fault::InvalidIoType),
            fault(codes::PRIO_002, Fault::InvalidIoIndex),
            fault(codes::PRIO_030, Fault::NoCommentOnIoPort),
        ]),
    RpcSpec::new("IOGTALL")
        .id(226)
        .args(&[io_type("type"), int("index"), int("cnt")])
        .fields(&[FieldSpec::required("value", FieldType::List(IO_PORT_STATE))])
        .faults(IO_FAULTS),
    RpcSpec::new("IOSIM")
        .args(IO_PORT_ARGS)
        .fields(IO_VALUE_FIELDS)
        .faults(IO_FAULTS),
    RpcSpec::new("IOUNSIM")
        .args(IO_PORT_ARGS)
        .faults(IO_FAULTS)
        .tolerates_empty_reply(),
    RpcSpec::new("IOVALRD")
        .id(62)
        .args(IO_PORT_ARGS)
        .fields(IO_VALUE_FIELDS)
        .faults(IO_FAULTS),
    RpcSpec::new("IOVALSET")
        .id(63)
        .args(&[io_type("type"), int("index"), int("value")])
        .faults(IO_FAULTS)
        .tolerates_empty_reply(),
    RpcSpec::new("IOWETRUN"),
    RpcSpec::new("LOCAL_START").id(245).args(&[int("value")]),
    RpcSpec::new("MMGETTYP").args(&[text("prog_name")]),
    RpcSpec::new("PASTELIN")
        .args(&[
            text("prog_name"),
            int("start"),
            int("end"),
            int("insert"),
            int("opt_sw"),
        ])
        .faults(&[
            fault(codes::MEMO_027, Fault::NoSuchLine),
            fault(codes::HRTL_022, Fault::InvalidArgument),
        ]),
    RpcSpec::new("PGABORT").id(102).args(&[text("task_name")]),
    RpcSpec::new("POSREGVALRD")
        .id(248)
        .args(&[int("grp_num"), int("index")])
        .fields(&[
            FieldSpec::required("value", FieldType::Str),
            FieldSpec::optional("type", FieldType::Int),
            FieldSpec::optional("comment", FieldType::Str),
        ]),
    RpcSpec::new("REGVALRD")
        .id(247)
        .args(&[int("index")])
        .fields(&[
            FieldSpec::required("value", FieldType::Number),
            FieldSpec::optional("type", FieldType::Int),
            FieldSpec::optional("comment", FieldType::Str),
        ]),
    RpcSpec::new("REMARKLIN")
        .args(&[text("prog_name"), int("start"), int("end"), int("remark")])
        .faults(&[fault(codes::HRTL_022, Fault::InvalidArgument)]),
    RpcSpec::new("RPRINTF").id(89).args(&[text("")]),
    RpcSpec::new("SCGETPOS")
        .args(&[text("prog_name"), int("pos_idx")])
        .faults(&[
            fault(codes::MEMO_071, Fault::PositionDoesNotExist),
            fault(codes::MEMO_073, Fault::ProgramDoesNotExist),
        ]),
    RpcSpec::new("TXCHGPRG")
        .id(43)
        .args(&[text("prog_name")])
        .faults(PROGRAM_FAULTS),
    RpcSpec::new("TXML_CURANG")
        .id(91)
        .args(&[int("grp_num")])
        .fields(VALUE_STR),
    RpcSpec::new("TXML_CURPOS")
        .id(90)
        .args(&[int("pos_rep"), int("pos_type"), int("grp_num")])
        .fields(VALUE_STR),
    RpcSpec::new("TXSETLIN")
        .id(237)
        .args(&[text("prog_name"), int("line_num")]),
    RpcSpec::new("VMIP_READVA")
        .id(31)
        .args(&[text("prog_name"), text("var_name")])
        .fields(&[
            FieldSpec::required("value", FieldType::Str),
            FieldSpec::optional("prog_name", FieldType::Str),
            FieldSpec::optional("var_name", FieldType::Str),
            FieldSpec::optional("type_code", FieldType::Int),
        ])
        .faults(VARIABLE_FAULTS),
    RpcSpec::new("VMIP_WRITEVA")
        .id(32)
        .args(&[text("prog_name"), text("var_name"), text("value")])
        .faults(&[
            fault(codes::VARS_006, Fault::UnknownVariable),
            fault(codes::VARS_011, Fault::NoDataDefinedForProgram),
            fault(codes::VARS_024, Fault::BadVariableOrRegisterIndex),
            fault(codes::VARS_049, Fault::BadElementInStructure),
        ])
        .tolerates_empty_reply(),
];

/// Find the spec for `name`, ignoring ASCII case.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static RpcSpec> {
    CATALOGUE.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// The spec for `name`, or the status-only [`GENERIC`] spec.
#[must_use]
pub fn spec_for(name: &str) -> &'static RpcSpec {
    lookup(name).unwrap_or(&GENERIC)
}

/// Log arguments that do not match the spec. Requests are sent regardless;
/// the controller has the final word on what it accepts.
pub fn check_args(spec: &RpcSpec, request: &RpcRequest) {
    if spec.name.is_empty() {
        return;
    }

    for arg in spec.args {
        match (request.get(arg.name), arg.kind) {
            (None, _) => warn!(rpc = spec.name, arg = arg.name, "Request omits argument"),
            (Some(ArgValue::Int(code)), ArgKind::IoType) => {
                let known = u16::try_from(*code)
                    .ok()
                    .and_then(|c| IoType::try_from(c).ok())
                    .is_some();
                if !known {
                    warn!(rpc = spec.name, arg = arg.name, code, "Unknown IO type code");
                }
            }
            (Some(ArgValue::Str(_)), ArgKind::Int | ArgKind::IoType) => {
                warn!(rpc = spec.name, arg = arg.name, "Expected an integer argument");
            }
            _ => {}
        }
    }

    for (name, _) in request.args() {
        if !spec.args.iter().any(|a| a.name == name) {
            warn!(rpc = spec.name, arg = %name, "Request has unexpected argument");
        }
    }
}

fn message_of(element: &Map<String, Value>) -> Option<String> {
    ["message", "msg"]
        .iter()
        .find_map(|key| element.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Check a decoded RPC element against `spec` and build the reply.
///
/// `rpc` is the name the call was made with; it is carried into the reply and
/// into any `RpcError`.
///
/// # Errors
///
/// Returns `Error::Rpc` when the controller reports a failure (including an
/// unsupported RPC), or `Error::Validation` when the element does not have
/// the shape `spec` describes.
pub fn validate(spec: &RpcSpec, rpc: &str, element: Map<String, Value>) -> Result<RpcReply> {
    let rpc_error = |code: ErrorCode, fault: Option<Fault>| RpcError {
        rpc: rpc.to_string(),
        code,
        message: message_of(&element),
        fault,
    };

    let echoed_id = element.get("rpc").map(parse_rpc_id).transpose()?;
    if matches!(echoed_id, Some(-1 | 0)) {
        let code = element
            .get("status")
            .and_then(|v| parse_status("status", v).ok())
            .unwrap_or(ErrorCode::OK);
        return Err(rpc_error(code, Some(Fault::NoSuchMethod)).into());
    }

    let status = match element.get("status") {
        Some(value) => parse_status("status", value)?,
        None => {
            return Err(ValidationError::MissingField {
                field: "status".to_string(),
            }
            .into());
        }
    };

    for secondary in spec.status_fields {
        let Some(value) = element.get(secondary.field) else {
            continue;
        };
        // Codes without a listed fault fall through to the main status.
        let code = parse_status(secondary.field, value)?;
        if let Some(fault) = lookup_fault(secondary.faults, code) {
            return Err(rpc_error(code, Some(fault)).into());
        }
    }

    if !status.is_ok() {
        return Err(rpc_error(status, spec.fault_for(status)).into());
    }

    match (spec.id, echoed_id) {
        (Some(expected), Some(found)) if found != i64::from(expected) => {
            return Err(ValidationError::RpcMismatch { expected, found }.into());
        }
        _ => {}
    }

    let fields = coerce_record(None, spec.fields, &element)?;

    Ok(RpcReply {
        rpc: rpc.to_string(),
        status,
        fields,
        raw: element,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use serde_json::json;

    fn element(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn check(name: &str, value: Value) -> Result<RpcReply> {
        validate(spec_for(name), name, element(value))
    }

    #[test]
    fn test_catalogue_names_are_unique() {
        let mut names: Vec<&str> = CATALOGUE.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOGUE.len());
        assert_eq!(CATALOGUE.len(), 36);
    }

    #[test]
    fn test_lookup_ignores_case() {
        assert_eq!(lookup("iovalrd").map(|s| s.id), Some(Some(62)));
        assert!(lookup("NOPE").is_none());
        assert_eq!(spec_for("NOPE"), &GENERIC);
    }

    #[test]
    fn test_tolerant_rpcs() {
        let tolerant: Vec<&str> = CATALOGUE
            .iter()
            .filter(|s| s.tolerates_empty_reply)
            .map(|s| s.name)
            .collect();
        assert_eq!(tolerant, ["IOUNSIM", "IOVALSET", "VMIP_WRITEVA"]);
    }

    #[test]
    fn test_iovalrd_success() {
        let reply = check("IOVALRD", json!({"status": 0, "value": 1})).unwrap();
        assert_eq!(reply.int("value"), Some(1));
        assert_eq!(reply.status, ErrorCode::OK);
    }

    #[test]
    fn test_iovalrd_failure_has_no_value() {
        let err = check("IOVALRD", json!({"status": 4})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rpc);
        let rpc = err.as_rpc().unwrap();
        assert_eq!(rpc.code, ErrorCode(4));
        assert_eq!(rpc.fault, None);
    }

    #[test]
    fn test_status_wins_over_missing_fields() {
        let err = check("IOVALRD", json!({"rpc": "62", "status": "0xD0001"})).unwrap_err();
        assert_eq!(err.fault(), Some(Fault::InvalidIoType));
        assert_eq!(err.as_rpc().map(|e| e.code), Some(codes::PRIO_001));
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let err = check("IOVALRD", json!({"rpc": "62", "status": "0x0"})).unwrap_err();
        match err {
            Error::Validation(ValidationError::MissingField { field }) => {
                assert_eq!(field, "value");
            }
            other => panic!("Expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_mistyped_field_is_named() {
        let err = check("IOVALRD", json!({"status": 0, "value": "ON"})).unwrap_err();
        let Error::Validation(inner) = &err else {
            panic!("Expected validation error, got {err:?}");
        };
        assert_eq!(inner.field(), Some("value"));
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_missing_status() {
        let err = check("IOVALRD", json!({"value": 1})).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField { ref field }) if field == "status"
        ));
    }

    #[test]
    fn test_no_such_method() {
        for id in [json!("-1"), json!(0)] {
            let err = check("IOGETHDB", json!({"rpc": id, "status": "0x0"})).unwrap_err();
            assert_eq!(err.fault(), Some(Fault::NoSuchMethod));
        }
    }

    #[test]
    fn test_rpc_id_mismatch() {
        let err = check("IOVALRD", json!({"rpc": "63", "status": "0x0", "value": 1})).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::RpcMismatch {
                expected: 62,
                found: 63
            })
        ));
    }

    #[test]
    fn test_simulation_rpcs_accept_iovalrd_id() {
        let reply = check("IOSIM", json!({"rpc": "62", "status": "0x0", "value": "1"})).unwrap();
        assert_eq!(reply.int("value"), Some(1));
        let reply = check("IOCKSIM", json!({"rpc": "62", "status": "0x0", "value": 0})).unwrap();
        assert_eq!(reply.int("value"), Some(0));
    }

    #[test]
    fn test_iocksim_fault_table() {
        let err = check("IOCKSIM", json!({"status": "0xD0017"})).unwrap_err();
        assert_eq!(err.fault(), Some(Fault::NoPortsOfThisType));
        // Same code, no meaning for IOVALRD.
        let err = check("IOVALRD", json!({"status": "0xD0017"})).unwrap_err();
        assert_eq!(err.fault(), None);
    }

    #[test]
    fn test_ioasglog_secondary_status() {
        let err = check("IOASGLOG", json!({"status": "0x0", "asg_stat": "0xD000B"})).unwrap_err();
        assert_eq!(err.fault(), Some(Fault::AssignmentOverlaps));

        let err = check("IOASGLOG", json!({"status": "0x0", "asg_stat": 0xD_0007})).unwrap_err();
        assert_eq!(err.fault(), Some(Fault::NoSuchAssignment));

        let reply = check("IOASGLOG", json!({"status": "0x0", "asg_stat": 0})).unwrap();
        assert_eq!(reply.raw_field("asg_stat"), Some(&json!(0)));
    }

    #[test]
    fn test_ioasglog_unlisted_secondary_code_defers_to_status() {
        let reply = check("IOASGLOG", json!({"status": "0x0", "asg_stat": "0x1"})).unwrap();
        assert!(reply.status.is_ok());
        assert_eq!(reply.raw_field("asg_stat"), Some(&json!("0x1")));

        let err = check("IOASGLOG", json!({"status": "0xD0002", "asg_stat": "0x1"})).unwrap_err();
        assert_eq!(err.as_rpc().map(|e| e.code), Some(codes::PRIO_002));
    }

    #[test]
    fn test_message_carried_verbatim() {
        let err = check("CPKCL", json!({"status": "0x100006", "msg": "Unknown variable"})).unwrap_err();
        assert_eq!(
            err.as_rpc().and_then(|e| e.message.as_deref()),
            Some("Unknown variable")
        );
    }

    #[test]
    fn test_iogtall_list() {
        let reply = check(
            "IOGTALL",
            json!({
                "rpc": "226",
                "status": "0x0",
                "value": [
                    {"index": "1", "val": "0", "sim": "0", "comment": ""},
                    {"index": "2", "val": "1", "sim": "1", "comment": "clamp"}
                ]
            }),
        )
        .unwrap();
        let ports = reply.list("value").unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1]["comment"].as_str(), Some("clamp"));
    }

    #[test]
    fn test_unknown_rpc_is_status_only() {
        let reply = check("GTSOMETHING", json!({"status": 0, "anything": [1, 2]})).unwrap();
        assert!(reply.fields.is_empty());
        assert_eq!(reply.raw_field("anything"), Some(&json!([1, 2])));
        assert_eq!(reply.rpc, "GTSOMETHING");
    }

    #[test]
    fn test_regvalrd_real_value() {
        let reply = check(
            "REGVALRD",
            json!({"rpc": "247", "status": "0x0", "type": "1", "value": "12.5", "comment": "speed"}),
        )
        .unwrap();
        assert_eq!(reply.number("value"), Some(12.5));
        assert_eq!(reply.str("comment"), Some("speed"));
    }

    #[test]
    fn test_check_args_does_not_reject() {
        let spec = spec_for("IOVALRD");
        check_args(spec, &RpcRequest::new("IOVALRD").arg("type", 999));
        check_args(spec, &RpcRequest::new("IOVALRD").arg("bogus", "x"));
    }
}
