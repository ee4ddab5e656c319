//! SysComm result codes
//!
//! These are wire values reported in the `error` / `error_descr` pair of a
//! response, not Rust errors: success codes travel the same way.

use std::fmt;

/// Result of processing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SysErrorCode {
    Ok = 0,
    OkData = 1,
    WrongJsonFormat = 2,
    ParseData = 3,
    ParseSignature = 4,
    SignatureMismatch = 5,
    ParseMessageId = 6,
    ParseMsgType = 7,
    ParsePayloadType = 8,
    ParseKey1 = 9,
    ParseKey2 = 10,
    NoMemory = 11,
    Unknown = 12,
}

/// (code, short name, description)
const ERROR_TABLE: &[(SysErrorCode, &str, &str)] = &[
    (SysErrorCode::Ok, "SYS_OK", "Result successful"),
    (SysErrorCode::OkData, "SYS_OK_DATA", "Result successful with data"),
    (SysErrorCode::WrongJsonFormat, "SYS_ERROR_WRONG_JSON_FORMAT", "Wrong JSON format or not a JSON object"),
    (SysErrorCode::ParseData, "SYS_ERROR_PARSE_DATA", "Key 'data' not found or empty"),
    (SysErrorCode::ParseSignature, "SYS_ERROR_PARSE_SIGNATURE", "Key 'signature' not found"),
    (SysErrorCode::SignatureMismatch, "SYS_ERROR_SIGNATURE_MISMATCH", "Signature does not match data"),
    (SysErrorCode::ParseMessageId, "SYS_ERROR_PARSE_MESSAGEID", "Key 'msgid' not found or wrong value"),
    (SysErrorCode::ParseMsgType, "SYS_ERROR_PARSE_MSGTYPE", "Key 'msgtype' not found or wrong value"),
    (SysErrorCode::ParsePayloadType, "SYS_ERROR_PARSE_PAYLOADTYPE", "Key 'payloadtype' not found or wrong value"),
    (SysErrorCode::ParseKey1, "SYS_ERROR_PARSE_KEY1", "Key 'key1' not found or wrong value"),
    (SysErrorCode::ParseKey2, "SYS_ERROR_PARSE_KEY2", "Key 'key2' not found or wrong value"),
    (SysErrorCode::NoMemory, "SYS_ERROR_NO_MEMORY", "Message too large or out of memory"),
    (SysErrorCode::Unknown, "SYS_ERROR_UNKNOWN", "Unknown error or unsupported payload type"),
];

impl SysErrorCode {
    fn entry(self) -> (&'static str, &'static str) {
        ERROR_TABLE
            .iter()
            .find(|(code, _, _)| *code == self)
            .map_or(("SYS_ERROR_UNKNOWN", "Unknown error"), |&(_, short, descr)| (short, descr))
    }

    /// Short name, e.g. `SYS_ERROR_PARSE_KEY2`
    pub fn short_name(self) -> &'static str {
        self.entry().0
    }

    /// Human readable description
    pub fn description(self) -> &'static str {
        self.entry().1
    }

    pub fn is_success(self) -> bool {
        matches!(self, SysErrorCode::Ok | SysErrorCode::OkData)
    }
}

impl fmt::Display for SysErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_code() {
        for raw in 0..=SysErrorCode::Unknown as u8 {
            assert!(
                ERROR_TABLE.iter().any(|(code, _, _)| *code as u8 == raw),
                "code {} missing from table",
                raw
            );
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(SysErrorCode::Ok.short_name(), "SYS_OK");
        assert_eq!(SysErrorCode::Ok.description(), "Result successful");
        assert_eq!(SysErrorCode::ParseKey2.to_string(), "SYS_ERROR_PARSE_KEY2");
        assert!(SysErrorCode::OkData.is_success());
        assert!(!SysErrorCode::Unknown.is_success());
    }
}
