//! Client for COMET, the JSON-RPC interface served by FANUC robot
//! controllers at `/COMET/rpc`.
//!
//! Each call is one blocking HTTP `GET`. The response body goes through three
//! stages before the caller sees it:
//!
//! 1. [`normalize`]: known malformations in the controller's JSON are
//!    repaired according to a configurable [`RepairPolicy`].
//! 2. [`protocol`]: the `{"FANUC":{"RPC":[...]}}` envelope is decoded.
//! 3. [`catalogue`]: the RPC element is checked against the declarative
//!    entry for the invoked RPC, and its status is mapped to success or an
//!    [`RpcError`] carrying an RPC-specific [`Fault`].
//!
//! Failures are always one of transport, malformed response, or RPC error;
//! see [`ErrorKind`].
//!
//! # Modules
//!
//! - [`client`]: [`CometClient`] and the call pipeline
//! - [`calls`]: typed methods for every catalogued RPC
//! - [`catalogue`]: per-RPC arguments, result fields and fault tables
//! - [`schema`]: field types and coercion of the controller's loose JSON
//! - [`views`]: typed views over validated replies
//! - [`transport`]: the HTTP seam and its `ureq` implementation
//! - [`config`]: [`ClientConfig`]
//!
//! # Example
//!
//! ```no_run
//! use comet_rpc::{ClientConfig, CometClient, IoType};
//!
//! # fn example() -> comet_rpc::Result<()> {
//! let client = CometClient::new(ClientConfig::new("192.168.1.10"))?;
//!
//! let port = client.read_io(IoType::DigitalOut, 1)?;
//! println!("DO[1] = {}", port.value);
//!
//! let version = client.read_variable("*SYSTEM*", "$VERSION")?;
//! println!("{}", version.value);
//! # Ok(())
//! # }
//! ```

pub mod calls;
pub mod catalogue;
pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod protocol;
pub mod schema;
pub mod transport;
pub mod views;

// Re-export the client surface
pub use calls::{ALL_TASKS, IoAssignment, SYSTEM_PROGRAM};
pub use client::{CometClient, decode_reply};
pub use config::ClientConfig;

// Re-export error types
pub use error::{
    Error, ErrorKind, Fault, MalformedResponse, Result, RpcError, TransportError,
    ValidationError,
};

// Re-export request/response types
pub use normalize::{Repair, RepairContext, RepairPolicy};
pub use protocol::{ArgValue, ResponseEnvelope, RpcRequest};
pub use schema::{FieldValue, Record, RpcReply};
pub use transport::{HttpRequest, HttpResponse, Transport, UreqTransport};
pub use views::{
    IoPortState, IoPortValue, PositionRegister, RawFile, RegisterNumber, RegisterValue,
    VariableValue,
};

// Re-export shared controller types
pub use comet_types::{ErrorCode, IoType, PasteLineOper, PositionType, RemarkLineOper, codes};
