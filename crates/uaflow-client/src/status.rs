// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes.
//!
//! Every result that crosses the stack boundary carries a [`StatusCode`].
//! The top two bits classify the code:
//!
//! ```text
//! 00 ... Good
//! 01 ... Uncertain
//! 10 ... Bad
//! ```
//!
//! The low 16 bits hold info flags and are ignored when resolving names.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// StatusSeverity
// =============================================================================

/// Coarse classification of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSeverity {
    /// The operation succeeded.
    Good,
    /// The operation succeeded but the value may not be usable.
    Uncertain,
    /// The operation failed.
    Bad,
}

impl fmt::Display for StatusSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Uncertain => write!(f, "uncertain"),
            Self::Bad => write!(f, "bad"),
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// An OPC UA status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: Self = Self(0x0000_0000);
    /// Uncertain.
    pub const UNCERTAIN: Self = Self(0x4000_0000);
    /// Bad.
    pub const BAD: Self = Self(0x8000_0000);
}

/// Well-known codes, named as in OPC UA Part 6 Annex A.
#[allow(missing_docs)]
impl StatusCode {
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: Self = Self(0x8003_0000);
    pub const BAD_RESOURCE_UNAVAILABLE: Self = Self(0x8004_0000);
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    pub const BAD_ENCODING_ERROR: Self = Self(0x8006_0000);
    pub const BAD_DECODING_ERROR: Self = Self(0x8007_0000);
    pub const BAD_ENCODING_LIMITS_EXCEEDED: Self = Self(0x8008_0000);
    pub const BAD_UNKNOWN_RESPONSE: Self = Self(0x8009_0000);
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    pub const BAD_SERVICE_UNSUPPORTED: Self = Self(0x800B_0000);
    pub const BAD_SHUTDOWN: Self = Self(0x800C_0000);
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(0x800D_0000);
    pub const BAD_SERVER_HALTED: Self = Self(0x800E_0000);
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);
    pub const BAD_TOO_MANY_OPERATIONS: Self = Self(0x8010_0000);
    pub const BAD_DATA_TYPE_ID_UNKNOWN: Self = Self(0x8011_0000);
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    pub const BAD_SECURE_CHANNEL_ID_INVALID: Self = Self(0x8022_0000);
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    pub const BAD_SESSION_CLOSED: Self = Self(0x8026_0000);
    pub const BAD_SESSION_NOT_ACTIVATED: Self = Self(0x8027_0000);
    pub const BAD_SUBSCRIPTION_ID_INVALID: Self = Self(0x8028_0000);
    pub const BAD_NODE_ID_INVALID: Self = Self(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    pub const BAD_INDEX_RANGE_INVALID: Self = Self(0x8036_0000);
    pub const BAD_INDEX_RANGE_NO_DATA: Self = Self(0x8037_0000);
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    pub const BAD_OUT_OF_RANGE: Self = Self(0x803C_0000);
    pub const BAD_NOT_SUPPORTED: Self = Self(0x803D_0000);
    pub const BAD_NOT_FOUND: Self = Self(0x803E_0000);
    pub const BAD_OBJECT_DELETED: Self = Self(0x803F_0000);
    pub const BAD_NOT_IMPLEMENTED: Self = Self(0x8040_0000);
    pub const BAD_MONITORING_MODE_INVALID: Self = Self(0x8041_0000);
    pub const BAD_MONITORED_ITEM_ID_INVALID: Self = Self(0x8042_0000);
    pub const BAD_MONITORED_ITEM_FILTER_INVALID: Self = Self(0x8043_0000);
    pub const BAD_MONITORED_ITEM_FILTER_UNSUPPORTED: Self = Self(0x8044_0000);
    pub const BAD_FILTER_NOT_ALLOWED: Self = Self(0x8045_0000);
    pub const BAD_CONTINUATION_POINT_INVALID: Self = Self(0x804A_0000);
    pub const BAD_NO_CONTINUATION_POINTS: Self = Self(0x804B_0000);
    pub const BAD_REFERENCE_TYPE_ID_INVALID: Self = Self(0x804C_0000);
    pub const BAD_BROWSE_DIRECTION_INVALID: Self = Self(0x804D_0000);
    pub const BAD_NO_MATCH: Self = Self(0x806F_0000);
    pub const BAD_HISTORY_OPERATION_INVALID: Self = Self(0x8071_0000);
    pub const BAD_HISTORY_OPERATION_UNSUPPORTED: Self = Self(0x8072_0000);
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    pub const BAD_METHOD_INVALID: Self = Self(0x8075_0000);
    pub const BAD_ARGUMENTS_MISSING: Self = Self(0x8076_0000);
    pub const BAD_TOO_MANY_SUBSCRIPTIONS: Self = Self(0x8077_0000);
    pub const BAD_NO_SUBSCRIPTION: Self = Self(0x8079_0000);
    pub const BAD_SECURE_CHANNEL_CLOSED: Self = Self(0x8086_0000);
    pub const BAD_NOT_CONNECTED: Self = Self(0x808A_0000);
    pub const BAD_NO_DATA: Self = Self(0x809B_0000);
    pub const BAD_ENTRY_EXISTS: Self = Self(0x809F_0000);
    pub const BAD_NO_ENTRY_EXISTS: Self = Self(0x80A0_0000);
    pub const BAD_INVALID_ARGUMENT: Self = Self(0x80AB_0000);
    pub const BAD_DISCONNECT: Self = Self(0x80AD_0000);
    pub const BAD_CONNECTION_CLOSED: Self = Self(0x80AE_0000);
    pub const BAD_INVALID_STATE: Self = Self(0x80AF_0000);
    pub const BAD_TOO_MANY_ARGUMENTS: Self = Self(0x80E5_0000);
}

impl StatusCode {
    /// Creates a status code from its raw value.
    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the code with the info bits cleared.
    #[inline]
    pub const fn sub_code(&self) -> u32 {
        self.0 & 0xFFFF_0000
    }

    /// Returns the severity encoded in the top two bits.
    pub const fn severity(&self) -> StatusSeverity {
        if self.0 & 0x8000_0000 != 0 {
            StatusSeverity::Bad
        } else if self.0 & 0x4000_0000 != 0 {
            StatusSeverity::Uncertain
        } else {
            StatusSeverity::Good
        }
    }

    /// Returns `true` for good codes.
    #[inline]
    pub const fn is_good(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Good)
    }

    /// Returns `true` for uncertain codes.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Uncertain)
    }

    /// Returns `true` for bad codes.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Bad)
    }

    /// Returns `true` if the code means the session or channel is gone.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            *self,
            Self::BAD_SESSION_ID_INVALID
                | Self::BAD_SESSION_CLOSED
                | Self::BAD_SECURE_CHANNEL_CLOSED
                | Self::BAD_SECURE_CHANNEL_ID_INVALID
                | Self::BAD_CONNECTION_CLOSED
        )
    }

    /// Returns `true` if the code reports a timeout of some kind.
    pub fn is_timeout(&self) -> bool {
        matches!(Self(self.sub_code()), Self::BAD_TIMEOUT)
    }

    /// Returns the symbolic name of this code.
    pub fn name(&self) -> &'static str {
        match self.sub_code() {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8003_0000 => "BadOutOfMemory",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x8006_0000 => "BadEncodingError",
            0x8007_0000 => "BadDecodingError",
            0x8008_0000 => "BadEncodingLimitsExceeded",
            0x8009_0000 => "BadUnknownResponse",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800E_0000 => "BadServerHalted",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x8011_0000 => "BadDataTypeIdUnknown",
            0x801F_0000 => "BadUserAccessDenied",
            0x8022_0000 => "BadSecureChannelIdInvalid",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8027_0000 => "BadSessionNotActivated",
            0x8028_0000 => "BadSubscriptionIdInvalid",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x8036_0000 => "BadIndexRangeInvalid",
            0x8037_0000 => "BadIndexRangeNoData",
            0x803A_0000 => "BadNotReadable",
            0x803B_0000 => "BadNotWritable",
            0x803C_0000 => "BadOutOfRange",
            0x803D_0000 => "BadNotSupported",
            0x803E_0000 => "BadNotFound",
            0x803F_0000 => "BadObjectDeleted",
            0x8040_0000 => "BadNotImplemented",
            0x8041_0000 => "BadMonitoringModeInvalid",
            0x8042_0000 => "BadMonitoredItemIdInvalid",
            0x8043_0000 => "BadMonitoredItemFilterInvalid",
            0x8044_0000 => "BadMonitoredItemFilterUnsupported",
            0x8045_0000 => "BadFilterNotAllowed",
            0x804A_0000 => "BadContinuationPointInvalid",
            0x804B_0000 => "BadNoContinuationPoints",
            0x804C_0000 => "BadReferenceTypeIdInvalid",
            0x804D_0000 => "BadBrowseDirectionInvalid",
            0x806F_0000 => "BadNoMatch",
            0x8071_0000 => "BadHistoryOperationInvalid",
            0x8072_0000 => "BadHistoryOperationUnsupported",
            0x8074_0000 => "BadTypeMismatch",
            0x8075_0000 => "BadMethodInvalid",
            0x8076_0000 => "BadArgumentsMissing",
            0x8077_0000 => "BadTooManySubscriptions",
            0x8079_0000 => "BadNoSubscription",
            0x8086_0000 => "BadSecureChannelClosed",
            0x808A_0000 => "BadNotConnected",
            0x809B_0000 => "BadNoData",
            0x809F_0000 => "BadEntryExists",
            0x80A0_0000 => "BadNoEntryExists",
            0x80AB_0000 => "BadInvalidArgument",
            0x80AD_0000 => "BadDisconnect",
            0x80AE_0000 => "BadConnectionClosed",
            0x80AF_0000 => "BadInvalidState",
            0x80E5_0000 => "BadTooManyArguments",
            _ => match self.severity() {
                StatusSeverity::Good => "Good",
                StatusSeverity::Uncertain => "Uncertain",
                StatusSeverity::Bad => "Bad",
            },
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({} {:#010x})", self.name(), self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_top_bits() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(StatusCode(0xC000_0000).is_bad());
    }

    #[test]
    fn test_name_ignores_info_bits() {
        let code = StatusCode(0x800A_0400);
        assert_eq!(code.name(), "BadTimeout");
        assert!(code.is_timeout());
    }

    #[test]
    fn test_unknown_code_falls_back_to_severity() {
        assert_eq!(StatusCode(0x80FF_0000).name(), "Bad");
        assert_eq!(StatusCode(0x40FF_0000).name(), "Uncertain");
    }

    #[test]
    fn test_display() {
        let text = StatusCode::BAD_NODE_ID_UNKNOWN.to_string();
        assert_eq!(text, "BadNodeIdUnknown (0x80340000)");
    }

    #[test]
    fn test_session_fatal() {
        assert!(StatusCode::BAD_SESSION_CLOSED.is_session_fatal());
        assert!(!StatusCode::BAD_NODE_ID_UNKNOWN.is_session_fatal());
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&StatusCode::BAD_TIMEOUT).unwrap();
        assert_eq!(json, "2148139008");
        let back: StatusCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusCode::BAD_TIMEOUT);
    }
}
