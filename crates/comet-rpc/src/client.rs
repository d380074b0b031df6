//! The COMET client.
//!
//! One call is one round trip: build the query, `GET` it, check the HTTP
//! status, normalize the body, decode the envelope, validate the element.
//! Nothing is kept between calls.

use tracing::{debug, trace};

use crate::catalogue::{self, RpcSpec};
use crate::config::ClientConfig;
use crate::error::{Result, TransportError};
use crate::normalize::{RepairContext, RepairPolicy};
use crate::protocol::{ResponseEnvelope, RpcRequest};
use crate::schema::RpcReply;
use crate::transport::{HttpRequest, Transport, UreqTransport};

const ACCEPT: &str = "application/json, text/javascript, */*";

/// Client for one controller.
#[derive(Debug)]
pub struct CometClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    policy: RepairPolicy,
}

impl CometClient<UreqTransport> {
    /// Client over the default `ureq` transport.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the config does not validate.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> CometClient<T> {
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the config does not validate.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            policy: RepairPolicy::standard(),
        })
    }

    #[must_use]
    pub fn with_repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn repair_policy(&self) -> &RepairPolicy {
        &self.policy
    }

    /// Invoke `request` and validate the reply against its catalogue entry.
    ///
    /// Names the catalogue does not know are still sent; their replies are
    /// only checked for a status.
    ///
    /// # Errors
    ///
    /// Returns a transport, malformed-response, validation, or RPC error, see
    /// [`crate::Error::kind`].
    pub fn call(&self, request: &RpcRequest) -> Result<RpcReply> {
        let spec = catalogue::spec_for(request.name());
        catalogue::check_args(spec, request);

        let body = self.send(request)?;
        decode_reply(spec, request.name(), &body, &self.policy)
    }

    /// Invoke `request` and return the body exactly as received.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or `Error::InvalidRequest` for an empty name.
    pub fn call_raw(&self, request: &RpcRequest) -> Result<String> {
        self.send(request)
    }

    fn send(&self, request: &RpcRequest) -> Result<String> {
        request.validate()?;

        let http = HttpRequest {
            url: format!("{}?{}", self.config.rpc_url(), request.to_query()),
            headers: vec![
                ("Referer", self.config.referer()),
                ("Accept", ACCEPT.to_string()),
            ],
            timeout: self.config.timeout(),
        };
        debug!(rpc = request.name(), url = %http.url, "Calling COMET");

        let response = self.transport.get(&http)?;
        trace!(
            rpc = request.name(),
            status = response.status,
            content_type = ?response.content_type,
            body = %response.body,
            "COMET response"
        );

        match response.status {
            200 => Ok(response.body),
            401 => Err(TransportError::Unauthorized.into()),
            403 => Err(TransportError::Forbidden.into()),
            other => Err(TransportError::UnexpectedStatus(other).into()),
        }
    }
}

/// Normalize, decode and validate a response body for `rpc`.
///
/// # Errors
///
/// Returns a malformed-response, validation, or RPC error.
pub fn decode_reply(
    spec: &RpcSpec,
    rpc: &str,
    body: &str,
    policy: &RepairPolicy,
) -> Result<RpcReply> {
    let ctx = RepairContext::new(rpc, spec);
    let text = policy.normalize(body, &ctx)?;
    let envelope = ResponseEnvelope::decode(&text)?;
    catalogue::validate(spec, rpc, envelope.element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind, Fault, MalformedResponse};
    use crate::transport::HttpResponse;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct MockTransport {
        status: u16,
        body: String,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for MockTransport {
        fn get(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: self.status,
                content_type: Some("text/html".to_string()),
                body: self.body.clone(),
            })
        }
    }

    fn client(mock: &MockTransport) -> CometClient<&MockTransport> {
        CometClient::with_transport(ClientConfig::new("robot"), mock).unwrap()
    }

    #[test]
    fn test_call_builds_url_and_headers() {
        let mock = MockTransport::new(
            200,
            r#"{"FANUC":{"name":"ROBOT","fastclock":"1","RPC":[{"rpc":"62","status":"0x0","value":"1"}]}}"#,
        );
        let reply = client(&mock)
            .call(&RpcRequest::new("IOVALRD").arg("type", 2).arg("index", 1))
            .unwrap();
        assert_eq!(reply.int("value"), Some(1));

        let seen = mock.last();
        assert_eq!(
            seen.url,
            "http://robot:80/COMET/rpc?func=IOVALRD&type=2&index=1"
        );
        assert!(seen.headers.contains(&("Referer", "http://robot:80".to_string())));
        assert!(seen.headers.contains(&("Accept", ACCEPT.to_string())));
    }

    #[test]
    fn test_http_status_mapping() {
        for (status, expected) in [(401, "401"), (403, "403"), (500, "500")] {
            let mock = MockTransport::new(status, "");
            let err = client(&mock).call(&RpcRequest::new("IOGETHDB")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transport, "status {expected}");
        }

        let mock = MockTransport::new(401, "");
        let err = client(&mock).call(&RpcRequest::new("IOGETHDB")).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Unauthorized)));

        let mock = MockTransport::new(403, "");
        let err = client(&mock).call(&RpcRequest::new("IOGETHDB")).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Forbidden)));

        let mock = MockTransport::new(404, "");
        let err = client(&mock).call(&RpcRequest::new("IOGETHDB")).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::UnexpectedStatus(404))
        ));
    }

    #[test]
    fn test_empty_name_never_sent() {
        let mock = MockTransport::new(200, "");
        let err = client(&mock).call(&RpcRequest::new("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(mock.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_rpc_list_tolerated_for_iovalset() {
        let mock = MockTransport::new(200, r#"{"FANUC":{"name":"ROBOT","fastclock":"7","RPC":]}}"#);
        let reply = client(&mock)
            .call(
                &RpcRequest::new("IOVALSET")
                    .arg("type", 2)
                    .arg("index", 1)
                    .arg("value", 1),
            )
            .unwrap();
        assert!(reply.status.is_ok());
    }

    #[test]
    fn test_empty_rpc_list_rejected_for_iovalrd() {
        let mock = MockTransport::new(200, r#"{"FANUC":{"name":"ROBOT","fastclock":"7","RPC":]}}"#);
        let err = client(&mock)
            .call(&RpcRequest::new("IOVALRD").arg("type", 2).arg("index", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Malformed(MalformedResponse::EmptyRpcList { .. })
        ));
    }

    #[test]
    fn test_strict_policy_rejects_repairable_body() {
        let mock = MockTransport::new(200, r#"{"FANUC":{"name":"ROBOT","fastclock":"7","RPC":]}}"#);
        let err = client(&mock)
            .with_repair_policy(RepairPolicy::strict())
            .call(&RpcRequest::new("IOVALSET"))
            .unwrap_err();
        assert!(matches!(err, Error::Malformed(MalformedResponse::Json(_))));
    }

    #[test]
    fn test_call_raw_returns_body_untouched() {
        let body = r#"{"FANUC":{"name":"ROBOT","fastclock":"7","RPC":]}}"#;
        let mock = MockTransport::new(200, body);
        let raw = client(&mock).call_raw(&RpcRequest::new("IOVALSET")).unwrap();
        assert_eq!(raw, body);
    }

    #[test]
    fn test_decode_reply_unsupported_rpc() {
        let body = r#"{"FANUC":{"name":"ROBOT","fastclock":"7","RPC":[{"rpc":"-1","status":"0x0"}]}}"#;
        let spec = catalogue::spec_for("IOWETRUN");
        let err = decode_reply(spec, "IOWETRUN", body, &RepairPolicy::standard()).unwrap_err();
        assert_eq!(err.fault(), Some(Fault::NoSuchMethod));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mock = MockTransport::new(200, "");
        let err = CometClient::with_transport(ClientConfig::new(""), &mock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
