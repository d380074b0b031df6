//! Property tests for response normalization.

use std::borrow::Cow;

use comet_rpc::catalogue::spec_for;
use comet_rpc::{RepairContext, RepairPolicy, ResponseEnvelope};
use proptest::prelude::*;
use serde_json::json;

fn well_formed(name: &str, value: &str, status: u32) -> String {
    json!({
        "FANUC": {
            "name": name,
            "fastclock": "1",
            "RPC": [{"rpc": "31", "status": format!("0x{status:X}"), "value": value}]
        }
    })
    .to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_well_formed_is_untouched(
        name in "[A-Z0-9_]{1,12}",
        value in "\\PC{0,40}",
        status in 0u32..0x00FF_FFFF,
    ) {
        let body = well_formed(&name, &value, status);
        let ctx = RepairContext::new("VMIP_READVA", spec_for("VMIP_READVA"));
        let out = RepairPolicy::standard().normalize(&body, &ctx).unwrap();
        prop_assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_trailing_garbage_repair_is_idempotent(
        value in "[ -~]{0,40}",
        garbage in prop::collection::vec(prop_oneof![Just('\0'), Just('}'), Just(']')], 1..8),
    ) {
        let clean = well_formed("ROBOT", &value, 0);
        let body: String = clean.chars().chain(garbage).collect();
        let ctx = RepairContext::new("VMIP_READVA", spec_for("VMIP_READVA"));
        let policy = RepairPolicy::standard();

        let once = policy.normalize(&body, &ctx).unwrap().into_owned();
        prop_assert_eq!(&once, &clean);
        let twice = policy.normalize(&once, &ctx).unwrap();
        prop_assert_eq!(&*twice, once.as_str());
    }

    #[test]
    fn test_empty_rpc_list_repair_decodes(
        name in "[A-Z0-9_]{1,12}",
        fastclock in 0u64..u64::from(u32::MAX),
    ) {
        let body = format!(r#"{{"FANUC":{{"name":"{name}","fastclock":"{fastclock}","RPC":]}}}}"#);
        let ctx = RepairContext::new("IOVALSET", spec_for("IOVALSET"));
        let policy = RepairPolicy::standard();

        let once = policy.normalize(&body, &ctx).unwrap().into_owned();
        let env = ResponseEnvelope::decode(&once).unwrap();
        prop_assert_eq!(env.name.as_deref(), Some(name.as_str()));
        prop_assert_eq!(&env.element["rpc"], &json!("63"));

        let twice = policy.normalize(&once, &ctx).unwrap();
        prop_assert_eq!(&*twice, once.as_str());
    }
}
