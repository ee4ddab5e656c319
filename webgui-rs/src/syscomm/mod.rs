//! Signed JSON messaging (SysComm)
//!
//! A request is an envelope
//!
//! ```text
//! {"data":{"msgid":1,"time":"...","msgtype":2,"payloadtype":50,"payload":{...}},
//!  "signature":"<hex HMAC-SHA256 of the data text>"}
//! ```
//!
//! Processing runs parse → verify → extract → dispatch → respond and stops at
//! the first failure. Failures never surface as transport errors: the reply is
//! always a JSON response object whose `error` field carries the result code.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use sha2::Sha256;

mod codes;
mod payload;

pub use codes::SysErrorCode;
pub use payload::{KeyValueHandler, PayloadHandler, PAYLOAD_KEY_VALUE};

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted input in bytes
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Valid payload type numbers
pub const PAYLOAD_TYPE_RANGE: std::ops::RangeInclusive<u16> = 1..=100;

/// Message type, `msgtype` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Command = 1,
    Request = 2,
    Response = 3,
}

impl MsgType {
    /// Message types a peer may send
    fn from_request(value: i64) -> Option<Self> {
        match value {
            1 => Some(MsgType::Command),
            2 => Some(MsgType::Request),
            _ => None,
        }
    }
}

/// What to do with the `signature` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignaturePolicy {
    /// Reject messages whose signature does not match
    #[default]
    Enforce,
    /// Require the field but only log the computed hash
    LogOnly,
}

/// Protocol settings
#[derive(Clone)]
pub struct SysCommConfig {
    /// Pre-shared HMAC key
    pub key: Vec<u8>,
    pub policy: SignaturePolicy,
    pub max_message_size: usize,
}

impl SysCommConfig {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            policy: SignaturePolicy::default(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_policy(mut self, policy: SignaturePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl std::fmt::Debug for SysCommConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysCommConfig")
            .field("key", &"<redacted>")
            .field("policy", &self.policy)
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

/// Validated contents of the `data` object
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub msg_id: u64,
    pub msg_type: MsgType,
    pub payload_type: u16,
    /// Producer timestamp, passed through unchecked
    pub time: Option<String>,
    pub payload: Option<Value>,
}

impl ParsedMessage {
    /// String member of the payload object
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

/// Outcome of handling one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysReply {
    pub code: SysErrorCode,
    /// Pretty-printed JSON response
    pub body: String,
}

#[derive(Serialize)]
struct Response<'a> {
    msgid: u64,
    time: String,
    messtype: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    payloadtype: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a Value>,
    error: &'static str,
    error_descr: &'static str,
}

/// Hex HMAC-SHA256 of `data` under `key`
pub fn sign(key: &[u8], data: &[u8]) -> String {
    hmac_of(key, data)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

fn hmac_of(key: &[u8], data: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac)
}

/// Progress through one message, for the error response
#[derive(Default)]
struct Progress {
    msg_id: u64,
    payload_type: Option<u16>,
}

/// Signed message processor with a payload handler table
pub struct SysComm {
    config: SysCommConfig,
    handlers: BTreeMap<u16, Box<dyn PayloadHandler>>,
}

impl SysComm {
    /// Create a processor with the built-in payload handlers registered
    pub fn new(config: SysCommConfig) -> Self {
        if config.key.is_empty() && config.policy == SignaturePolicy::Enforce {
            warn!("SysComm key is empty, signed messages are rejected until a key is set");
        }
        let mut syscomm = Self {
            config,
            handlers: BTreeMap::new(),
        };
        syscomm.register_handler(PAYLOAD_KEY_VALUE, KeyValueHandler);
        syscomm
    }

    /// Register or replace the handler for `payload_type`.
    ///
    /// Returns false and ignores the handler when the type is out of range.
    pub fn register_handler<H>(&mut self, payload_type: u16, handler: H) -> bool
    where
        H: PayloadHandler + 'static,
    {
        if !PAYLOAD_TYPE_RANGE.contains(&payload_type) {
            warn!("Payload type {} out of range, handler ignored", payload_type);
            return false;
        }
        if self.handlers.insert(payload_type, Box::new(handler)).is_some() {
            debug!("Replaced handler for payload type {}", payload_type);
        }
        true
    }

    pub fn config(&self) -> &SysCommConfig {
        &self.config
    }

    /// Replace the HMAC key
    pub fn set_key(&mut self, key: impl Into<Vec<u8>>) {
        self.config.key = key.into();
    }

    /// Process one message, stamping the response with the current time
    pub fn handle(&self, input: &[u8]) -> SysReply {
        self.handle_at(input, Utc::now())
    }

    /// Process one message, stamping the response with `now`
    pub fn handle_at(&self, input: &[u8], now: DateTime<Utc>) -> SysReply {
        let mut progress = Progress::default();
        let (code, payload) = match self.process(input, &mut progress) {
            Ok(None) => (SysErrorCode::Ok, None),
            Ok(Some(payload)) => (SysErrorCode::OkData, Some(payload)),
            Err(code) => (code, None),
        };

        if code.is_success() {
            debug!("Message {} processed: {}", progress.msg_id, code);
        } else {
            warn!("Message {} rejected: {}", progress.msg_id, code);
        }

        let response = Response {
            msgid: progress.msg_id,
            time: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            messtype: MsgType::Response as u8,
            payloadtype: progress.payload_type,
            payload: payload.as_ref(),
            error: code.short_name(),
            error_descr: code.description(),
        };
        // Fixed-shape struct of strings and numbers
        let body = serde_json::to_string_pretty(&response).unwrap_or_default();
        SysReply { code, body }
    }

    fn process(&self, input: &[u8], progress: &mut Progress) -> Result<Option<Value>, SysErrorCode> {
        if input.len() > self.config.max_message_size {
            return Err(SysErrorCode::NoMemory);
        }

        let root: HashMap<String, &RawValue> =
            serde_json::from_slice(input).map_err(|_| SysErrorCode::WrongJsonFormat)?;

        let data_raw = root.get("data").ok_or(SysErrorCode::ParseData)?;
        let data: Map<String, Value> =
            serde_json::from_str(data_raw.get()).map_err(|_| SysErrorCode::ParseData)?;
        if data.is_empty() {
            return Err(SysErrorCode::ParseData);
        }

        let signature = root
            .get("signature")
            .and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
            .ok_or(SysErrorCode::ParseSignature)?;
        self.verify(data_raw.get().as_bytes(), &signature)?;

        let msg_id = data
            .get("msgid")
            .and_then(Value::as_u64)
            .filter(|&id| id > 0)
            .ok_or(SysErrorCode::ParseMessageId)?;
        progress.msg_id = msg_id;

        let msg_type = data
            .get("msgtype")
            .and_then(Value::as_i64)
            .and_then(MsgType::from_request)
            .ok_or(SysErrorCode::ParseMsgType)?;

        let payload_type = data
            .get("payloadtype")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| PAYLOAD_TYPE_RANGE.contains(v))
            .ok_or(SysErrorCode::ParsePayloadType)?;
        progress.payload_type = Some(payload_type);

        let message = ParsedMessage {
            msg_id,
            msg_type,
            payload_type,
            time: data.get("time").and_then(Value::as_str).map(str::to_string),
            payload: data.get("payload").cloned(),
        };

        let handler = self.handlers.get(&payload_type).ok_or(SysErrorCode::Unknown)?;
        handler.handle(&message)
    }

    fn verify(&self, data: &[u8], signature: &str) -> Result<(), SysErrorCode> {
        match self.config.policy {
            SignaturePolicy::LogOnly => {
                info!("HMAC of data object is {}", sign(&self.config.key, data));
                Ok(())
            }
            SignaturePolicy::Enforce => {
                // An empty key never verifies
                if self.config.key.is_empty() {
                    return Err(SysErrorCode::SignatureMismatch);
                }
                let expected = hex::decode(signature).map_err(|_| SysErrorCode::SignatureMismatch)?;
                let Some(mac) = hmac_of(&self.config.key, data) else {
                    return Err(SysErrorCode::SignatureMismatch);
                };
                // Constant-time comparison
                mac.verify_slice(&expected).map_err(|_| SysErrorCode::SignatureMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const KEY: &[u8] = b"mykey";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 3, 12, 25, 24).unwrap()
    }

    fn envelope(data: &str) -> String {
        format!(r#"{{"data":{},"signature":"{}"}}"#, data, sign(KEY, data.as_bytes()))
    }

    fn run(syscomm: &SysComm, input: &str) -> (SysErrorCode, Value) {
        let reply = syscomm.handle_at(input.as_bytes(), now());
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        (reply.code, body)
    }

    fn enforcing() -> SysComm {
        SysComm::new(SysCommConfig::new(KEY))
    }

    #[test]
    fn test_request_end_to_end() {
        let data = r#"{"msgid":1,"time":"2023-01-01T00:00:00Z","msgtype":2,"payloadtype":50}"#;
        let (code, body) = run(&enforcing(), &envelope(data));
        assert_eq!(code, SysErrorCode::OkData);
        assert_eq!(
            body,
            json!({
                "msgid": 1,
                "time": "2023-06-03T12:25:24+00:00",
                "messtype": 3,
                "payloadtype": 50,
                "payload": {"param1": "value1", "param2": "value2"},
                "error": "SYS_OK_DATA",
                "error_descr": "Result successful with data",
            })
        );
    }

    #[test]
    fn test_log_only_accepts_any_signature() {
        let syscomm = SysComm::new(SysCommConfig::new(KEY).with_policy(SignaturePolicy::LogOnly));
        let input = format!(
            r#"{{"data":{{"msgid":1,"time":"2023-01-01T00:00:00Z","msgtype":2,"payloadtype":50}},"signature":"{}"}}"#,
            "ab".repeat(32)
        );
        let (code, body) = run(&syscomm, &input);
        assert_eq!(code, SysErrorCode::OkData);
        assert_eq!(body["msgid"], 1);
        assert_eq!(body["messtype"], 3);
        assert_eq!(body["payload"]["param2"], "value2");
    }

    #[test]
    fn test_command_acknowledged() {
        let data = r#"{"msgid":77,"msgtype":1,"payloadtype":50,"payload":{"key1":"a","key2":"b"}}"#;
        let (code, body) = run(&enforcing(), &envelope(data));
        assert_eq!(code, SysErrorCode::Ok);
        assert_eq!(body["error"], "SYS_OK");
        assert_eq!(body["error_descr"], "Result successful");
        assert!(body.get("payload").is_none());
    }

    #[test]
    fn test_command_missing_key2() {
        let data = r#"{"msgid":5,"msgtype":1,"payloadtype":50,"payload":{"key1":"a"}}"#;
        let (code, body) = run(&enforcing(), &envelope(data));
        assert_eq!(code, SysErrorCode::ParseKey2);
        assert_eq!(body["error"], "SYS_ERROR_PARSE_KEY2");
        assert_eq!(body["msgid"], 5);
        assert_eq!(body["payloadtype"], 50);
    }

    #[test]
    fn test_missing_signature_rejected_before_dispatch() {
        // would be a key error if it reached the handler
        let input = r#"{"data":{"msgid":5,"msgtype":1,"payloadtype":50,"payload":{}}}"#;
        let (code, body) = run(&enforcing(), input);
        assert_eq!(code, SysErrorCode::ParseSignature);
        assert_eq!(body["msgid"], 0);
        assert!(body.get("payloadtype").is_none());
    }

    #[test]
    fn test_signature_mismatch() {
        let data = r#"{"msgid":1,"msgtype":2,"payloadtype":50}"#;
        let forged = format!(r#"{{"data":{},"signature":"{}"}}"#, data, sign(b"otherkey", data.as_bytes()));
        assert_eq!(run(&enforcing(), &forged).0, SysErrorCode::SignatureMismatch);

        let not_hex = format!(r#"{{"data":{},"signature":"zz"}}"#, data);
        assert_eq!(run(&enforcing(), &not_hex).0, SysErrorCode::SignatureMismatch);
    }

    #[test]
    fn test_empty_key_rejects_everything() {
        let data = r#"{"msgid":3,"msgtype":1,"payloadtype":50,"payload":{"key1":"a","key2":"b"}}"#;
        let input = format!(r#"{{"data":{},"signature":"{}"}}"#, data, sign(b"", data.as_bytes()));
        let default_key = crate::SystemConfig::default().message_key;
        let s = SysComm::new(SysCommConfig::new(default_key.as_bytes()));
        let (code, body) = run(&s, &input);
        assert_eq!(code, SysErrorCode::SignatureMismatch);
        assert!(body.get("payload").is_none());

        // Provisioning a key makes the same device accept properly signed input
        let mut s = s;
        s.set_key(KEY);
        assert_eq!(run(&s, &envelope(data)).0, SysErrorCode::Ok);
    }

    #[test]
    fn test_signature_covers_exact_data_text() {
        let signed = r#"{"msgid":1,"msgtype":2,"payloadtype":50}"#;
        let spaced = r#"{"msgid":1, "msgtype":2, "payloadtype":50}"#;
        let input = format!(r#"{{"data":{},"signature":"{}"}}"#, spaced, sign(KEY, signed.as_bytes()));
        assert_eq!(run(&enforcing(), &input).0, SysErrorCode::SignatureMismatch);
    }

    #[test]
    fn test_structural_errors() {
        let s = enforcing();
        assert_eq!(run(&s, "[1,2]").0, SysErrorCode::WrongJsonFormat);
        assert_eq!(run(&s, "not json").0, SysErrorCode::WrongJsonFormat);
        assert_eq!(run(&s, r#"{"signature":"00"}"#).0, SysErrorCode::ParseData);
        assert_eq!(run(&s, r#"{"data":{},"signature":"00"}"#).0, SysErrorCode::ParseData);
        assert_eq!(run(&s, r#"{"data":"text","signature":"00"}"#).0, SysErrorCode::ParseData);
    }

    #[test]
    fn test_field_errors() {
        let s = enforcing();
        let cases = [
            (r#"{"msgtype":2,"payloadtype":50}"#, SysErrorCode::ParseMessageId),
            (r#"{"msgid":0,"msgtype":2,"payloadtype":50}"#, SysErrorCode::ParseMessageId),
            (r#"{"msgid":1,"msgtype":3,"payloadtype":50}"#, SysErrorCode::ParseMsgType),
            (r#"{"msgid":1,"payloadtype":50}"#, SysErrorCode::ParseMsgType),
            (r#"{"msgid":1,"msgtype":2,"payloadtype":0}"#, SysErrorCode::ParsePayloadType),
            (r#"{"msgid":1,"msgtype":2,"payloadtype":101}"#, SysErrorCode::ParsePayloadType),
            (r#"{"msgid":1,"msgtype":2}"#, SysErrorCode::ParsePayloadType),
            (r#"{"msgid":1,"msgtype":2,"payloadtype":7}"#, SysErrorCode::Unknown),
        ];
        for (data, expected) in cases {
            assert_eq!(run(&s, &envelope(data)).0, expected, "data: {}", data);
        }
    }

    #[test]
    fn test_oversized_input() {
        let padding = "x".repeat(MAX_MESSAGE_SIZE);
        let data = format!(r#"{{"msgid":1,"msgtype":2,"payloadtype":50,"pad":"{}"}}"#, padding);
        let (code, body) = run(&enforcing(), &envelope(&data));
        assert_eq!(code, SysErrorCode::NoMemory);
        assert_eq!(body["error"], "SYS_ERROR_NO_MEMORY");
    }

    #[test]
    fn test_custom_handler() {
        let mut s = enforcing();
        assert!(s.register_handler(7, |msg: &ParsedMessage| -> Result<Option<Value>, SysErrorCode> {
            Ok(Some(json!({ "echo": msg.payload_str("text") })))
        }));
        assert!(!s.register_handler(0, KeyValueHandler));

        let data = r#"{"msgid":9,"msgtype":1,"payloadtype":7,"payload":{"text":"hi"}}"#;
        let (code, body) = run(&s, &envelope(data));
        assert_eq!(code, SysErrorCode::OkData);
        assert_eq!(body["payload"]["echo"], "hi");
    }

    #[test]
    fn test_response_is_pretty_printed() {
        let reply = enforcing().handle_at(b"[]", now());
        assert!(reply.body.contains('\n'));
        assert!(reply.body.starts_with("{\n"));
    }
}
