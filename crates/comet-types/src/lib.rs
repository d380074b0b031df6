//! Shared controller types for the COMET RPC client.
//!
//! These are plain tags and codes used to parameterize RPCs and to interpret
//! their status words. None of them carry behaviour beyond conversion and
//! display. All types are serializable so callers can embed them in their own
//! configuration or logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// I/O port categories, as numbered in `kliotyps.kl` (V9.40).
///
/// Serializes as the bare integer the controller uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum IoType {
    None = 0,
    DigitalIn = 1,
    DigitalOut = 2,
    AnalogIn = 3,
    AnalogOut = 4,
    ToolOut = 5,
    PlcIn = 6,
    PlcOut = 7,
    RobotDigitalIn = 8,
    RobotDigitalOut = 9,
    BrakeOut = 10,
    /// Operator panel input. Newer manuals call this `SoPanelIn`.
    OpPanelIn = 11,
    /// Operator panel output. Newer manuals call this `SoPanelOut`.
    OpPanelOut = 12,
    Estop = 13,
    TpIn = 14,
    TpOut = 15,
    WeldDigitalIn = 16,
    WeldDigitalOut = 17,
    /// Grouped inputs (16 bits)
    GroupedIn = 18,
    /// Grouped outputs (16 bits)
    GroupedOut = 19,
    UserOpPanelIn = 20,
    UserOpPanelOut = 21,
    LaserDigIn = 22,
    LaserDigOut = 23,
    LaserAnaIn = 24,
    LaserAnaOut = 25,
    WeldStickInput = 26,
    WeldStickOutput = 27,
    MemImgBoolean = 28,
    MemImgDigIn = 29,
    DummyBoolPort = 30,
    DummyNumPort = 31,
    ProcessAxis = 32,
    InternalOpPanelInput = 33,
    InternalOpPanelOutput = 34,
    /// Flag (`F[ ]`)
    Flag = 35,
    /// Marker (`M[ ]`)
    Marker = 36,
    /// Grouped inputs (32 bits)
    GroupedIn32 = 37,
    /// Grouped outputs (32 bits)
    GroupedOut32 = 38,
    // Physical port types only below this point.
    InternalRelayBackup = 41,
    InternalRelay = 42,
    InternalRegBackup = 43,
    InternalReg = 44,
}

impl IoType {
    pub const SO_PANEL_IN: IoType = IoType::OpPanelIn;
    pub const SO_PANEL_OUT: IoType = IoType::OpPanelOut;

    const ALL: [IoType; 43] = [
        IoType::None,
        IoType::DigitalIn,
        IoType::DigitalOut,
        IoType::AnalogIn,
        IoType::AnalogOut,
        IoType::ToolOut,
        IoType::PlcIn,
        IoType::PlcOut,
        IoType::RobotDigitalIn,
        IoType::RobotDigitalOut,
        IoType::BrakeOut,
        IoType::OpPanelIn,
        IoType::OpPanelOut,
        IoType::Estop,
        IoType::TpIn,
        IoType::TpOut,
        IoType::WeldDigitalIn,
        IoType::WeldDigitalOut,
        IoType::GroupedIn,
        IoType::GroupedOut,
        IoType::UserOpPanelIn,
        IoType::UserOpPanelOut,
        IoType::LaserDigIn,
        IoType::LaserDigOut,
        IoType::LaserAnaIn,
        IoType::LaserAnaOut,
        IoType::WeldStickInput,
        IoType::WeldStickOutput,
        IoType::MemImgBoolean,
        IoType::MemImgDigIn,
        IoType::DummyBoolPort,
        IoType::DummyNumPort,
        IoType::ProcessAxis,
        IoType::InternalOpPanelInput,
        IoType::InternalOpPanelOutput,
        IoType::Flag,
        IoType::Marker,
        IoType::GroupedIn32,
        IoType::GroupedOut32,
        IoType::InternalRelayBackup,
        IoType::InternalRelay,
        IoType::InternalRegBackup,
        IoType::InternalReg,
    ];

    /// The integer the controller uses for this port type.
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl From<IoType> for u16 {
    fn from(value: IoType) -> Self {
        value.code()
    }
}

impl TryFrom<u16> for IoType {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        IoType::ALL
            .iter()
            .copied()
            .find(|t| t.code() == value)
            .ok_or_else(|| format!("unknown IO type: {value}"))
    }
}

/// Representation of a position register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum PositionType {
    XyzWpr = 2,
    JointPos = 9,
}

impl From<PositionType> for u16 {
    fn from(value: PositionType) -> Self {
        value as u16
    }
}

impl TryFrom<u16> for PositionType {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(PositionType::XyzWpr),
            9 => Ok(PositionType::JointPos),
            other => Err(format!("unknown position type: {other}")),
        }
    }
}

/// Operation performed by PASTELIN on the selected lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasteLineOper {
    /// Duplicate the selection.
    Copy,
    /// Move the selection.
    Cut,
}

impl PasteLineOper {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            PasteLineOper::Copy => 0,
            PasteLineOper::Cut => 1,
        }
    }
}

/// Operation performed by REMARKLIN. "Remark" is FANUC for "comment out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemarkLineOper {
    Unremark,
    Remark,
}

impl RemarkLineOper {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            RemarkLineOper::Unremark => 0,
            RemarkLineOper::Remark => 1,
        }
    }
}

/// A controller status word: facility byte in bits 16..24, error number in
/// the low 16 bits. Zero means OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const OK: ErrorCode = ErrorCode(0);

    #[must_use]
    pub const fn new(facility: u8, number: u16) -> Self {
        ErrorCode(((facility as u32) << 16) | number as u32)
    }

    #[must_use]
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    // Only bits 16..24 are the facility; the cast keeps exactly that byte.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn facility(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn number(self) -> u16 {
        self.0 as u16
    }

    /// Facility mnemonic (`PRIO`, `VARS`, ...) when known.
    #[must_use]
    pub fn facility_name(self) -> Option<&'static str> {
        match self.facility() {
            0x07 => Some("MEMO"),
            0x0D => Some("PRIO"),
            0x10 => Some("VARS"),
            0x21 => Some("DICT"),
            0x42 => Some("HRTL"),
            _ => None,
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(value: u32) -> Self {
        ErrorCode(value)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.facility_name() {
            Some(name) => write!(f, "{name}-{:03}", self.number()),
            None => write!(f, "0x{:06X}", self.0),
        }
    }
}

/// Error dictionary entries the client gives a specific meaning to.
pub mod codes {
    use super::ErrorCode;

    /// Dictionary not found
    pub const DICT_004: ErrorCode = ErrorCode::new(0x21, 4);
    /// Dictionary element not found
    pub const DICT_005: ErrorCode = ErrorCode::new(0x21, 5);

    pub const HRTL_022: ErrorCode = ErrorCode::new(0x42, 22);

    pub const MEMO_027: ErrorCode = ErrorCode::new(0x07, 27);
    pub const MEMO_071: ErrorCode = ErrorCode::new(0x07, 71);
    /// The specified program does not exist in the system
    pub const MEMO_073: ErrorCode = ErrorCode::new(0x07, 73);

    pub const PRIO_001: ErrorCode = ErrorCode::new(0x0D, 1);
    pub const PRIO_002: ErrorCode = ErrorCode::new(0x0D, 2);
    pub const PRIO_007: ErrorCode = ErrorCode::new(0x0D, 7);
    pub const PRIO_011: ErrorCode = ErrorCode::new(0x0D, 11);
    pub const PRIO_023: ErrorCode = ErrorCode::new(0x0D, 23);
    pub const PRIO_030: ErrorCode = ErrorCode::new(0x0D, 30);

    pub const VARS_006: ErrorCode = ErrorCode::new(0x10, 6);
    pub const VARS_011: ErrorCode = ErrorCode::new(0x10, 11);
    /// Invalid index into an array or path
    pub const VARS_024: ErrorCode = ErrorCode::new(0x10, 24);
    /// ASCII value specified is invalid
    pub const VARS_049: ErrorCode = ErrorCode::new(0x10, 49);
}
