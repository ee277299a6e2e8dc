use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors raised by the expiration core.
///
/// The core does no I/O, so every variant is a caller contract violation or a
/// moment the calendar cannot represent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExpiryError {
    /// Negative server timestamp or zero duration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Timestamp or calendar arithmetic outside the representable range.
    #[error("calendar overflow: {0}")]
    CalendarOverflow(String),

    /// Wall-clock moment with no instant in the configured zone.
    #[error("local time {0} cannot be resolved in this time zone")]
    UnresolvableLocalTime(NaiveDateTime),
}

pub type Result<T> = std::result::Result<T, ExpiryError>;
