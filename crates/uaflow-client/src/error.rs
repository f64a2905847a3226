// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA client runtime.
//!
//! Errors are split by where they were detected:
//!
//! ```text
//! UaError
//! ├── Client        - Local misuse detected before anything is dispatched
//! ├── Protocol      - Bad status codes returned by the server
//! ├── Transport     - Timeouts, closed connections, stack failures
//! ├── Codec         - Value and filter conversion failures
//! └── Configuration - Invalid settings or unreadable config files
//! ```
//!
//! Only failures detected before a request leaves the process are returned
//! as `Err`. Anything dispatched to the stack resolves to a result that
//! carries a [`StatusCode`]; [`UaError::check`] turns such a code back into
//! an error when a caller prefers `?`.
//!
//! # Examples
//!
//! ```
//! use uaflow_client::error::{UaError, ErrorSeverity};
//! use uaflow_client::StatusCode;
//!
//! let error = UaError::from_status(StatusCode::BAD_TIMEOUT, "read");
//! assert!(error.is_retryable());
//! assert_eq!(error.status_code(), StatusCode::BAD_TIMEOUT);
//! assert_eq!(error.severity(), ErrorSeverity::Warning);
//! ```

use std::fmt;
use std::io;

use thiserror::Error;
use tracing::Level;

use crate::status::StatusCode;

/// Result alias used throughout the crate.
pub type UaResult<T> = Result<T, UaError>;

// =============================================================================
// UaError - Main Error Type
// =============================================================================

/// The main error type of the client runtime.
#[derive(Debug, Error)]
pub enum UaError {
    /// Local misuse.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// Status returned by the remote peer.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Transport or stack failure.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Value or filter conversion failure.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl UaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a client error.
    #[inline]
    pub fn client(error: ClientError) -> Self {
        Self::Client(error)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(error: TransportError) -> Self {
        Self::Transport(error)
    }

    /// Creates a codec error.
    #[inline]
    pub fn codec(error: CodecError) -> Self {
        Self::Codec(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// The connection is not live.
    pub fn not_connected() -> Self {
        Self::Client(ClientError::NotConnected)
    }

    /// The node handle is not registered.
    pub fn unknown_handle(handle: u32) -> Self {
        Self::Client(ClientError::UnknownHandle { handle })
    }

    /// A value did not have the expected kind.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Client(ClientError::type_mismatch(expected, actual))
    }

    /// The requested operation is not implemented.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::Client(ClientError::not_implemented(operation))
    }

    /// The worker has stopped and can no longer accept commands.
    pub fn worker_stopped() -> Self {
        Self::Client(ClientError::WorkerStopped)
    }

    /// Classifies a bad status code into a protocol or transport error.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            s if s.is_timeout() => Self::Transport(TransportError::Timeout { context }),
            StatusCode::BAD_CONNECTION_CLOSED
            | StatusCode::BAD_DISCONNECT
            | StatusCode::BAD_NOT_CONNECTED
            | StatusCode::BAD_SERVER_NOT_CONNECTED
            | StatusCode::BAD_SECURE_CHANNEL_CLOSED
            | StatusCode::BAD_COMMUNICATION_ERROR
            | StatusCode::BAD_SHUTDOWN => Self::Transport(TransportError::ConnectionClosed {
                reason: Some(format!("{context}: {status}")),
                status,
            }),
            StatusCode::BAD_INTERNAL_ERROR
            | StatusCode::BAD_UNEXPECTED_ERROR
            | StatusCode::BAD_OUT_OF_MEMORY
            | StatusCode::BAD_RESOURCE_UNAVAILABLE => {
                Self::Transport(TransportError::Internal {
                    message: context,
                    status,
                })
            }
            _ => Self::Protocol(ProtocolError::from_status(status, context)),
        }
    }

    /// Returns `Ok(())` for good and uncertain codes, an error otherwise.
    pub fn check(status: StatusCode, context: impl Into<String>) -> UaResult<()> {
        if status.is_bad() {
            Err(Self::from_status(status, context))
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the OPC UA status code that best describes this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Client(e) => e.status_code(),
            Self::Protocol(e) => e.status_code(),
            Self::Transport(e) => e.status_code(),
            Self::Codec(e) => e.status_code(),
            Self::Configuration(_) => StatusCode::BAD_INVALID_ARGUMENT,
        }
    }

    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(e) => matches!(e, ClientError::NotConnected),
            Self::Protocol(e) => e.is_retryable(),
            Self::Transport(e) => e.is_retryable(),
            Self::Codec(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Client(ClientError::WorkerStopped) => ErrorSeverity::Error,
            Self::Client(_) => ErrorSeverity::Warning,
            Self::Protocol(_) => ErrorSeverity::Warning,
            Self::Transport(TransportError::Internal { .. }) => ErrorSeverity::Error,
            Self::Transport(_) => ErrorSeverity::Warning,
            Self::Codec(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Protocol(_) => "protocol",
            Self::Transport(_) => "transport",
            Self::Codec(_) => "codec",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let status = self.status_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                status = %status,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                status = %status,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                status = %status,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ClientError
// =============================================================================

/// Local misuse, detected before anything reaches the stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The connection is not live.
    #[error("Not connected to an OPC UA server")]
    NotConnected,

    /// The node handle is not registered.
    #[error("Unknown node handle {handle}")]
    UnknownHandle {
        /// The handle.
        handle: u32,
    },

    /// A value did not have the expected kind.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected kind.
        expected: String,
        /// Actual kind.
        actual: String,
    },

    /// The operation is not implemented.
    #[error("Not implemented: {operation}")]
    NotImplemented {
        /// Operation name.
        operation: String,
    },

    /// The attribute is already monitored.
    #[error("Attribute {attribute} of handle {handle} is already monitored")]
    AlreadyMonitored {
        /// Node handle.
        handle: u32,
        /// Attribute name.
        attribute: String,
    },

    /// The attribute is not monitored.
    #[error("Attribute {attribute} of handle {handle} is not monitored")]
    NotMonitored {
        /// Node handle.
        handle: u32,
        /// Attribute name.
        attribute: String,
    },

    /// No subscription with this id exists.
    #[error("Unknown subscription {subscription_id}")]
    UnknownSubscription {
        /// Subscription id.
        subscription_id: u32,
    },

    /// The operation is not valid in the current state.
    #[error("Invalid state: {reason}")]
    InvalidState {
        /// Reason.
        reason: String,
    },

    /// An argument was rejected.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason.
        reason: String,
    },

    /// The connection worker is gone.
    #[error("Connection worker has stopped")]
    WorkerStopped,
}

impl ClientError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a not implemented error.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Creates an already monitored error.
    pub fn already_monitored(handle: u32, attribute: impl fmt::Display) -> Self {
        Self::AlreadyMonitored {
            handle,
            attribute: attribute.to_string(),
        }
    }

    /// Creates a not monitored error.
    pub fn not_monitored(handle: u32, attribute: impl fmt::Display) -> Self {
        Self::NotMonitored {
            handle,
            attribute: attribute.to_string(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns the matching status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConnected => StatusCode::BAD_NOT_CONNECTED,
            Self::UnknownHandle { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            Self::TypeMismatch { .. } => StatusCode::BAD_TYPE_MISMATCH,
            Self::NotImplemented { .. } => StatusCode::BAD_NOT_IMPLEMENTED,
            Self::AlreadyMonitored { .. } => StatusCode::BAD_ENTRY_EXISTS,
            Self::NotMonitored { .. } => StatusCode::BAD_NO_ENTRY_EXISTS,
            Self::UnknownSubscription { .. } => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            Self::InvalidState { .. } => StatusCode::BAD_INVALID_STATE,
            Self::InvalidArgument { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            Self::WorkerStopped => StatusCode::BAD_SHUTDOWN,
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// A bad status code returned by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The node does not exist on the server.
    #[error("Node unknown ({context})")]
    NodeUnknown {
        /// Operation context.
        context: String,
    },

    /// The user may not perform the operation.
    #[error("Access denied ({context})")]
    AccessDenied {
        /// Operation context.
        context: String,
        /// Exact status code.
        status: StatusCode,
    },

    /// The index range is invalid or selects no data.
    #[error("Index range invalid ({context})")]
    IndexRangeInvalid {
        /// Operation context.
        context: String,
        /// Exact status code.
        status: StatusCode,
    },

    /// The subscription id is not known to the server.
    #[error("Subscription id invalid ({context})")]
    SubscriptionIdInvalid {
        /// Operation context.
        context: String,
    },

    /// The monitored item id is not known to the server.
    #[error("Monitored item id invalid ({context})")]
    MonitoredItemIdInvalid {
        /// Operation context.
        context: String,
    },

    /// A method call had the wrong number of arguments.
    #[error("Method argument count mismatch ({context}): {status}")]
    ArgumentCount {
        /// Operation context.
        context: String,
        /// `BadArgumentsMissing` or `BadTooManyArguments`.
        status: StatusCode,
    },

    /// Any other bad status.
    #[error("Server returned {status} ({context})")]
    Bad {
        /// Operation context.
        context: String,
        /// Status code.
        status: StatusCode,
    },
}

impl ProtocolError {
    /// Classifies a server status code.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            StatusCode::BAD_NODE_ID_UNKNOWN => Self::NodeUnknown { context },
            StatusCode::BAD_USER_ACCESS_DENIED
            | StatusCode::BAD_NOT_READABLE
            | StatusCode::BAD_NOT_WRITABLE => Self::AccessDenied { context, status },
            StatusCode::BAD_INDEX_RANGE_INVALID | StatusCode::BAD_INDEX_RANGE_NO_DATA => {
                Self::IndexRangeInvalid { context, status }
            }
            StatusCode::BAD_SUBSCRIPTION_ID_INVALID => Self::SubscriptionIdInvalid { context },
            StatusCode::BAD_MONITORED_ITEM_ID_INVALID => Self::MonitoredItemIdInvalid { context },
            StatusCode::BAD_ARGUMENTS_MISSING | StatusCode::BAD_TOO_MANY_ARGUMENTS => {
                Self::ArgumentCount { context, status }
            }
            _ => Self::Bad { context, status },
        }
    }

    /// Returns the status code reported by the server.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NodeUnknown { .. } => StatusCode::BAD_NODE_ID_UNKNOWN,
            Self::SubscriptionIdInvalid { .. } => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            Self::MonitoredItemIdInvalid { .. } => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
            Self::AccessDenied { status, .. }
            | Self::IndexRangeInvalid { status, .. }
            | Self::ArgumentCount { status, .. }
            | Self::Bad { status, .. } => *status,
        }
    }

    /// Returns `true` if the server may accept the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status_code(),
            StatusCode::BAD_TOO_MANY_OPERATIONS
                | StatusCode::BAD_SERVER_HALTED
                | StatusCode::BAD_NO_CONTINUATION_POINTS
        )
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Failures of the connection or the stack itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request or connection timed out.
    #[error("Timed out ({context})")]
    Timeout {
        /// Operation context.
        context: String,
    },

    /// The connection was closed.
    #[error("Connection closed{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    ConnectionClosed {
        /// Reason for closure.
        reason: Option<String>,
        /// Status code.
        status: StatusCode,
    },

    /// The stack refused to enqueue a service call.
    #[error("Stack rejected {service} request: {status}")]
    DispatchRejected {
        /// Service name.
        service: String,
        /// Status code reported by the stack.
        status: StatusCode,
    },

    /// Internal stack failure.
    #[error("Internal stack error: {message} ({status})")]
    Internal {
        /// Message.
        message: String,
        /// Status code.
        status: StatusCode,
    },
}

impl TransportError {
    /// Returns the matching status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::BAD_TIMEOUT,
            Self::ConnectionClosed { status, .. }
            | Self::DispatchRejected { status, .. }
            | Self::Internal { status, .. } => *status,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}

// =============================================================================
// CodecError
// =============================================================================

/// Value and filter conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A value kind disagreed with the type hint.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Hinted wire type.
        expected: String,
        /// Actual value kind.
        actual: String,
    },

    /// Dimensions do not describe the element count.
    #[error("Invalid array dimensions: {reason}")]
    InvalidDimensions {
        /// Reason.
        reason: String,
    },

    /// An encoded body ended early.
    #[error("Truncated body: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes needed.
        needed: usize,
        /// Bytes remaining.
        remaining: usize,
    },

    /// An encoded body could not be interpreted.
    #[error("Invalid encoding: {reason}")]
    InvalidEncoding {
        /// Reason.
        reason: String,
    },

    /// A filter expression is malformed.
    #[error("Invalid filter: {reason}")]
    InvalidFilter {
        /// Reason.
        reason: String,
    },
}

impl CodecError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates an invalid dimensions error.
    pub fn invalid_dimensions(reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            reason: reason.into(),
        }
    }

    /// Creates an invalid encoding error.
    pub fn invalid_encoding(reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            reason: reason.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            reason: reason.into(),
        }
    }

    /// Returns the matching status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TypeMismatch { .. } => StatusCode::BAD_TYPE_MISMATCH,
            Self::InvalidDimensions { .. } => StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
            Self::Truncated { .. } | Self::InvalidEncoding { .. } => StatusCode::BAD_DECODING_ERROR,
            Self::InvalidFilter { .. } => StatusCode::BAD_MONITORED_ITEM_FILTER_INVALID,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A field failed validation.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A node id string could not be parsed.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// Input string.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// A configuration document could not be parsed.
    #[error("Failed to parse {format} configuration: {message}")]
    Parse {
        /// Document format.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The file extension does not name a known format.
    #[error("Unsupported configuration format '{extension}'")]
    UnsupportedFormat {
        /// The extension.
        extension: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}'")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConfigurationError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(format: &'static str, message: impl fmt::Display) -> Self {
        Self::Parse {
            format,
            message: message.to_string(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Warning - operation failed but recovery is possible.
    Warning,
    /// Error - operation failed.
    Error,
    /// Critical - the client cannot work with this input.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            UaError::from_status(StatusCode::BAD_TIMEOUT, "read"),
            UaError::Transport(TransportError::Timeout { .. })
        ));
        assert!(matches!(
            UaError::from_status(StatusCode::BAD_CONNECTION_CLOSED, "read"),
            UaError::Transport(TransportError::ConnectionClosed { .. })
        ));
        assert!(matches!(
            UaError::from_status(StatusCode::BAD_NODE_ID_UNKNOWN, "read"),
            UaError::Protocol(ProtocolError::NodeUnknown { .. })
        ));
        assert!(matches!(
            UaError::from_status(StatusCode::BAD_TOO_MANY_ARGUMENTS, "call"),
            UaError::Protocol(ProtocolError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_status_code_round_trips_through_classification() {
        for status in [
            StatusCode::BAD_TIMEOUT,
            StatusCode::BAD_NODE_ID_UNKNOWN,
            StatusCode::BAD_USER_ACCESS_DENIED,
            StatusCode::BAD_INDEX_RANGE_INVALID,
            StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
            StatusCode::BAD_INTERNAL_ERROR,
            StatusCode::BAD_TYPE_MISMATCH,
        ] {
            assert_eq!(UaError::from_status(status, "ctx").status_code(), status);
        }
    }

    #[test]
    fn test_check() {
        assert!(UaError::check(StatusCode::GOOD, "x").is_ok());
        assert!(UaError::check(StatusCode::UNCERTAIN, "x").is_ok());
        assert!(UaError::check(StatusCode::BAD_NOT_WRITABLE, "x").is_err());
    }

    #[test]
    fn test_client_error_codes() {
        assert_eq!(
            ClientError::already_monitored(1, "Value").status_code(),
            StatusCode::BAD_ENTRY_EXISTS
        );
        assert_eq!(
            ClientError::not_monitored(1, "Value").status_code(),
            StatusCode::BAD_NO_ENTRY_EXISTS
        );
        assert_eq!(
            UaError::not_connected().status_code(),
            StatusCode::BAD_NOT_CONNECTED
        );
    }

    #[test]
    fn test_severity_and_category() {
        let err = UaError::codec(CodecError::type_mismatch("Int32", "String"));
        assert_eq!(err.category(), "codec");
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert!(!err.is_retryable());

        let err = UaError::not_connected();
        assert!(err.is_retryable());
        assert_eq!(err.tracing_level(), Level::WARN);
    }

    #[test]
    fn test_display() {
        let err = UaError::from_status(StatusCode::BAD_CONNECTION_CLOSED, "drive");
        assert!(err.to_string().starts_with("Connection closed: drive"));

        let err = ClientError::already_monitored(7, "Value");
        assert_eq!(err.to_string(), "Attribute Value of handle 7 is already monitored");
    }
}
