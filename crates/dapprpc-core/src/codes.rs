//! Numeric status codes: method-layer provider errors, JSON-RPC errors and
//! `CloseEvent` transport close codes.

/// The user rejected the request.
pub const USER_REJECTED_REQUEST: i64 = 4001;
/// The requested method and/or account has not been authorized.
pub const UNAUTHORIZED: i64 = 4100;
/// The provider does not support the requested method.
pub const UNSUPPORTED_METHOD: i64 = 4200;
/// The provider is disconnected from all chains.
pub const DISCONNECTED: i64 = 4900;
/// The provider is not connected to the requested chain.
pub const CHAIN_DISCONNECTED: i64 = 4901;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Close code used when a transport reports a close without one.
pub const CLOSE_ABNORMAL: u16 = 1006;
pub const CLOSE_NORMAL: u16 = 1000;

/// Short description for a method-layer or JSON-RPC error code.
pub fn error_description(code: i64) -> Option<&'static str> {
    Some(match code {
        USER_REJECTED_REQUEST => "User Rejected Request",
        UNAUTHORIZED => "Unauthorized",
        UNSUPPORTED_METHOD => "Unsupported Method",
        DISCONNECTED => "Disconnected",
        CHAIN_DISCONNECTED => "Chain Disconnected",
        PARSE_ERROR => "Parse error",
        INVALID_REQUEST => "Invalid Request",
        METHOD_NOT_FOUND => "Method not found",
        INVALID_PARAMS => "Invalid params",
        INTERNAL_ERROR => "Internal error",
        _ => return None,
    })
}

/// Description of a `CloseEvent` status code (RFC 6455 §7.4.1).
pub fn close_description(code: u16) -> Option<&'static str> {
    Some(match code {
        1000 => "Normal Closure",
        1001 => "Going Away",
        1002 => "Protocol Error",
        1003 => "Unsupported Data",
        1005 => "No Status Received",
        1006 => "Abnormal Closure",
        1007 => "Invalid frame payload data",
        1008 => "Policy Violation",
        1009 => "Message too big",
        1010 => "Missing Extension",
        1011 => "Internal Error",
        1012 => "Service Restart",
        1013 => "Try Again Later",
        1014 => "Bad Gateway",
        1015 => "TLS Handshake",
        _ => return None,
    })
}

/// Fill in the defaults for a close signal that may lack a code or reason.
pub fn close_defaults(code: Option<u16>, reason: Option<String>) -> (u16, String) {
    let code = code.unwrap_or(CLOSE_ABNORMAL);
    let reason = match reason {
        Some(r) if !r.is_empty() => r,
        _ => close_description(code).unwrap_or_default().to_string(),
    };
    (code, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_close_code_is_abnormal() {
        assert_eq!(close_defaults(None, None), (1006, "Abnormal Closure".to_string()));
    }

    #[test]
    fn supplied_reason_wins() {
        assert_eq!(
            close_defaults(Some(1006), Some("abnormal".into())),
            (1006, "abnormal".to_string())
        );
    }

    #[test]
    fn empty_reason_falls_back_to_table() {
        assert_eq!(
            close_defaults(Some(1001), Some(String::new())),
            (1001, "Going Away".to_string())
        );
        // unknown codes get an empty reason
        assert_eq!(close_defaults(Some(4321), None), (4321, String::new()));
    }

    #[test]
    fn provider_codes_described() {
        assert_eq!(error_description(4200), Some("Unsupported Method"));
        assert_eq!(error_description(12), None);
    }
}
