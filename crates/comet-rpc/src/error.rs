//! Error types for the comet-rpc crate.
//!
//! Every failed call ends up in exactly one of three buckets, reported by
//! [`Error::kind`]: the request never completed (transport), the controller
//! answered with something we cannot interpret (malformed response), or the
//! controller answered cleanly and reported a failure (RPC error).

use std::fmt;

use comet_types::ErrorCode;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    MalformedResponse,
    Rpc,
    Usage,
}

/// Unified error type for COMET calls
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    Malformed(#[from] MalformedResponse),

    #[error("Invalid response: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Malformed(_) | Error::Validation(_) => ErrorKind::MalformedResponse,
            Error::Rpc(_) => ErrorKind::Rpc,
            Error::InvalidRequest(_) => ErrorKind::Usage,
        }
    }

    /// The remote failure, if this is an RPC error.
    #[must_use]
    pub fn as_rpc(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }

    /// Shorthand for the RPC-specific meaning of a remote failure.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        self.as_rpc().and_then(|e| e.fault)
    }
}

/// The HTTP exchange with the controller did not complete successfully.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed (HTTP 401)")]
    Unauthorized,

    #[error("Access is forbidden or locked (HTTP 403)")]
    Forbidden,

    #[error("Unexpected HTTP status: expected 200, got {0}")]
    UnexpectedStatus(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The response body could not be turned into a COMET response envelope,
/// even after repairs.
#[derive(Debug, thiserror::Error)]
pub enum MalformedResponse {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty RPC list in response to {rpc}")]
    EmptyRpcList { rpc: String },

    #[error("no 'FANUC' envelope in response")]
    MissingEnvelope,

    #[error("no 'RPC' list in response envelope")]
    MissingRpcList,

    #[error("expected 1 RPC element, got {0}")]
    ElementCount(usize),

    #[error("RPC element is not an object")]
    ElementNotObject,
}

/// The envelope decoded, but its RPC element does not have the shape the
/// invoked RPC returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' has unexpected type: expected {expected}, got {found}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("response is for RPC id {found}, expected {expected}")]
    RpcMismatch { expected: u16, found: i64 },
}

impl ValidationError {
    /// Name (or path, for nested records) of the offending field.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::UnexpectedType { field, .. } => Some(field),
            ValidationError::RpcMismatch { .. } => None,
        }
    }
}

/// The controller reported a non-OK status for the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub rpc: String,
    pub code: ErrorCode,
    pub message: Option<String>,
    pub fault: Option<Fault>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {} failed with status {}", self.rpc, self.code)?;
        if let Some(fault) = self.fault {
            write!(f, " ({fault})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

/// RPC-specific meaning of a status code.
///
/// The same code can mean different things for different RPCs, so the mapping
/// lives in the catalogue, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    NoSuchMethod,
    InvalidIoType,
    InvalidIoIndex,
    NoPortsOfThisType,
    NoCommentOnIoPort,
    NoSuchAssignment,
    AssignmentOverlaps,
    UnknownVariable,
    NoDataDefinedForProgram,
    BadVariableOrRegisterIndex,
    BadElementInStructure,
    NoSuchLine,
    PositionDoesNotExist,
    ProgramDoesNotExist,
    DictNotFound,
    DictElementNotFound,
    InvalidArgument,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Fault::NoSuchMethod => "unsupported RPC",
            Fault::InvalidIoType => "illegal port type",
            Fault::InvalidIoIndex => "illegal port number",
            Fault::NoPortsOfThisType => "no ports of this type",
            Fault::NoCommentOnIoPort => "no comment on port",
            Fault::NoSuchAssignment => "no such assignment",
            Fault::AssignmentOverlaps => "assignment overlaps an existing one",
            Fault::UnknownVariable => "unknown variable",
            Fault::NoDataDefinedForProgram => "no data defined for program",
            Fault::BadVariableOrRegisterIndex => "bad variable or register index",
            Fault::BadElementInStructure => "bad element in structure",
            Fault::NoSuchLine => "no such line",
            Fault::PositionDoesNotExist => "position does not exist",
            Fault::ProgramDoesNotExist => "program does not exist",
            Fault::DictNotFound => "dictionary not found",
            Fault::DictElementNotFound => "dictionary element not found",
            Fault::InvalidArgument => "invalid argument",
        };
        f.write_str(text)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
