//! Payload handlers

use serde_json::{json, Value};

use super::{MsgType, ParsedMessage, SysErrorCode};

/// Handles the payload of one payload type.
///
/// `Ok(None)` acknowledges a command (`SYS_OK`), `Ok(Some(payload))` answers
/// with data (`SYS_OK_DATA`).
pub trait PayloadHandler: Send + Sync {
    fn handle(&self, msg: &ParsedMessage) -> Result<Option<Value>, SysErrorCode>;
}

impl<F> PayloadHandler for F
where
    F: Fn(&ParsedMessage) -> Result<Option<Value>, SysErrorCode> + Send + Sync,
{
    fn handle(&self, msg: &ParsedMessage) -> Result<Option<Value>, SysErrorCode> {
        self(msg)
    }
}

/// Payload type of the built-in key/value exchange
pub const PAYLOAD_KEY_VALUE: u16 = 50;

/// Built-in key/value exchange.
///
/// A command must carry string `key1` and `key2`; a request is answered with
/// a fixed parameter set.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueHandler;

impl PayloadHandler for KeyValueHandler {
    fn handle(&self, msg: &ParsedMessage) -> Result<Option<Value>, SysErrorCode> {
        match msg.msg_type {
            MsgType::Command => {
                msg.payload_str("key1").ok_or(SysErrorCode::ParseKey1)?;
                msg.payload_str("key2").ok_or(SysErrorCode::ParseKey2)?;
                Ok(None)
            }
            MsgType::Request => Ok(Some(json!({
                "param1": "value1",
                "param2": "value2",
            }))),
            MsgType::Response => Err(SysErrorCode::ParseMsgType),
        }
    }
}
