//! Result codes shared by every AT and session operation.

use core::fmt;

/// The error type for AT-command and MQTT session operations.
///
/// Every variant maps onto a stable numeric result code (see [`Error::code`]) so
/// the values can cross an FFI boundary or be reported by a device shell.
/// The JSON and shadow variants are reserved for the document services that sit
/// on top of a session; nothing in this crate produces them except
/// [`Error::JsonParse`] when a configuration document is malformed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The modem rejected the command or the operation failed for a generic reason.
    Failure,
    /// An argument was invalid, e.g. a command that does not fit the command buffer.
    InvalidArgument,
    /// A required handle was missing.
    Null,
    /// A buffer or thread could not be allocated.
    OutOfMemory,
    /// No terminal response (or asynchronous acknowledgement) arrived in time.
    Timeout,
    /// A response object could not be created.
    ResponseUnavailable,
    /// The subscription table is full.
    ExceedMaxTopics,
    /// The operation needs an established MQTT connection.
    NotConnected,
    /// Fewer raw bytes were written than the declared payload length.
    SendData,
    /// The session was torn down by a disconnect notification.
    Cancelled,
    /// A JSON document could not be parsed.
    JsonParse,
    /// A JSON document would be truncated.
    JsonBufferTruncated,
    /// The buffer holding a JSON document is too small.
    JsonBufferTooSmall,
    /// A JSON document could not be generated.
    Json,
    /// A JSON document has too many tokens.
    MaxJsonToken,
    /// Too many document requests are pending.
    MaxAppendingRequest,
    /// A topic is longer than the supported maximum.
    MaxTopicLength,
    /// The shadow property is already registered.
    ShadowPropertyExist,
    /// The shadow property is not registered.
    ShadowPropertyNotExist,
    /// Updating the shadow document timed out.
    ShadowUpdateTimeout,
    /// Updating the shadow document was rejected.
    ShadowUpdateRejected,
    /// Fetching the shadow document timed out.
    ShadowGetTimeout,
    /// Fetching the shadow document was rejected.
    ShadowGetRejected,
}

const CODES: [(Error, i32); 23] = [
    (Error::Failure, -100),
    (Error::InvalidArgument, -101),
    (Error::Null, -102),
    (Error::OutOfMemory, -103),
    (Error::Timeout, -201),
    (Error::ResponseUnavailable, -202),
    (Error::ExceedMaxTopics, -203),
    (Error::NotConnected, -204),
    (Error::SendData, -205),
    (Error::Cancelled, -206),
    (Error::JsonParse, -301),
    (Error::JsonBufferTruncated, -302),
    (Error::JsonBufferTooSmall, -303),
    (Error::Json, -304),
    (Error::MaxJsonToken, -305),
    (Error::MaxAppendingRequest, -306),
    (Error::MaxTopicLength, -307),
    (Error::ShadowPropertyExist, -401),
    (Error::ShadowPropertyNotExist, -402),
    (Error::ShadowUpdateTimeout, -403),
    (Error::ShadowUpdateRejected, -404),
    (Error::ShadowGetTimeout, -405),
    (Error::ShadowGetRejected, -406),
];

impl Error {
    /// Numeric result code of this error. Success is `0` and is never an `Error`.
    pub fn code(self) -> i32 {
        CODES
            .iter()
            .find(|(err, _)| *err == self)
            .map(|(_, code)| *code)
            .unwrap_or(-100)
    }

    /// Looks up the error for a numeric result code.
    ///
    /// Returns `None` for `0` (success) and for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(err, _)| *err)
    }

    /// Whether the error ends the session for good.
    pub fn is_fatal(self) -> bool {
        self == Error::Cancelled
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::Failure => "command failed",
            Error::InvalidArgument => "invalid argument",
            Error::Null => "missing handle",
            Error::OutOfMemory => "out of memory",
            Error::Timeout => "timed out",
            Error::ResponseUnavailable => "response object unavailable",
            Error::ExceedMaxTopics => "too many subscribed topics",
            Error::NotConnected => "mqtt not connected",
            Error::SendData => "raw data not fully sent",
            Error::Cancelled => "session cancelled by disconnect",
            Error::JsonParse => "json parse error",
            Error::JsonBufferTruncated => "json document truncated",
            Error::JsonBufferTooSmall => "json buffer too small",
            Error::Json => "json generation error",
            Error::MaxJsonToken => "too many json tokens",
            Error::MaxAppendingRequest => "too many pending document requests",
            Error::MaxTopicLength => "topic too long",
            Error::ShadowPropertyExist => "shadow property exists",
            Error::ShadowPropertyNotExist => "shadow property does not exist",
            Error::ShadowUpdateTimeout => "shadow update timed out",
            Error::ShadowUpdateRejected => "shadow update rejected",
            Error::ShadowGetTimeout => "shadow get timed out",
            Error::ShadowGetRejected => "shadow get rejected",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Error({=i32})", self.code())
    }
}
