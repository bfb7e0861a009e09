//! Error types for the chat client.
//!
//! Transport failures are never returned to callers as `Err`; they are
//! classified into a [`TransportErrorKind`] and published as events. The
//! [`ClientError`] type only covers misuse of the command handle.

use std::io;

use thiserror::Error;

/// How loudly a transport error should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable; the connection stays up.
    Warning,
    /// Fatal to the connection.
    Error,
}

/// Classified transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    HostUnreachable,
    Timeout,
    PermissionDenied,
    ResourceExhausted,
    /// The peer violated the framing protocol.
    Protocol,
    /// The peer closed the connection gracefully.
    RemoteClosed,
    /// Transient failure; the operation may be retried.
    Temporary,
    Unclassified,
}

impl TransportErrorKind {
    /// Severity to report, or `None` when the failure is an ordinary close.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            TransportErrorKind::RemoteClosed => None,
            TransportErrorKind::Temporary => Some(Severity::Warning),
            _ => Some(Severity::Error),
        }
    }

    /// Whether the connection must be torn down.
    pub fn forces_disconnect(&self) -> bool {
        !matches!(self, TransportErrorKind::Temporary)
    }

    /// User-facing description.
    pub fn description(&self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionRefused => "The host refused the connection",
            TransportErrorKind::HostUnreachable => "Could not find the server",
            TransportErrorKind::Timeout => "Operation timed out",
            TransportErrorKind::PermissionDenied => {
                "You don't have permissions to execute this operation"
            }
            TransportErrorKind::ResourceExhausted => "Too many connections opened",
            TransportErrorKind::Protocol => "Communication with the server failed",
            TransportErrorKind::RemoteClosed => "The host terminated the connection",
            TransportErrorKind::Temporary => "Operation failed, please try again",
            TransportErrorKind::Unclassified => "An unknown error occurred",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// OS error codes for descriptor and buffer exhaustion (EMFILE, ENFILE, ENOBUFS).
#[cfg(unix)]
const RESOURCE_ERRNOS: &[i32] = &[24, 23, 105];
#[cfg(not(unix))]
const RESOURCE_ERRNOS: &[i32] = &[];

impl From<&io::Error> for TransportErrorKind {
    fn from(err: &io::Error) -> Self {
        if err
            .raw_os_error()
            .is_some_and(|code| RESOURCE_ERRNOS.contains(&code))
        {
            return TransportErrorKind::ResourceExhausted;
        }

        match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NotFound => TransportErrorKind::HostUnreachable,
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            io::ErrorKind::PermissionDenied => TransportErrorKind::PermissionDenied,
            io::ErrorKind::OutOfMemory => TransportErrorKind::ResourceExhausted,
            io::ErrorKind::InvalidData => TransportErrorKind::Protocol,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportErrorKind::RemoteClosed,
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                TransportErrorKind::Temporary
            }
            _ => TransportErrorKind::Unclassified,
        }
    }
}

/// Errors returned by the [`ChatClient`](crate::ChatClient) command handle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection driver task has stopped.
    #[error("Chat client is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(kind: io::ErrorKind) -> TransportErrorKind {
        TransportErrorKind::from(&io::Error::new(kind, "test"))
    }

    #[test]
    fn test_classify_io_errors() {
        assert_eq!(
            classify(io::ErrorKind::ConnectionRefused),
            TransportErrorKind::ConnectionRefused
        );
        assert_eq!(classify(io::ErrorKind::TimedOut), TransportErrorKind::Timeout);
        assert_eq!(
            classify(io::ErrorKind::PermissionDenied),
            TransportErrorKind::PermissionDenied
        );
        assert_eq!(
            classify(io::ErrorKind::HostUnreachable),
            TransportErrorKind::HostUnreachable
        );
        assert_eq!(
            classify(io::ErrorKind::InvalidData),
            TransportErrorKind::Protocol
        );
        assert_eq!(
            classify(io::ErrorKind::ConnectionReset),
            TransportErrorKind::RemoteClosed
        );
        assert_eq!(
            classify(io::ErrorKind::Interrupted),
            TransportErrorKind::Temporary
        );
        assert_eq!(
            classify(io::ErrorKind::Other),
            TransportErrorKind::Unclassified
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_descriptor_exhaustion() {
        let err = io::Error::from_raw_os_error(24);
        assert_eq!(
            TransportErrorKind::from(&err),
            TransportErrorKind::ResourceExhausted
        );
    }

    #[test]
    fn test_error_dispositions() {
        assert_eq!(TransportErrorKind::RemoteClosed.severity(), None);
        assert!(TransportErrorKind::RemoteClosed.forces_disconnect());

        assert_eq!(
            TransportErrorKind::Temporary.severity(),
            Some(Severity::Warning)
        );
        assert!(!TransportErrorKind::Temporary.forces_disconnect());

        assert_eq!(
            TransportErrorKind::ConnectionRefused.severity(),
            Some(Severity::Error)
        );
        assert!(TransportErrorKind::Protocol.forces_disconnect());
    }

    #[test]
    fn test_display_uses_description() {
        assert_eq!(
            TransportErrorKind::ConnectionRefused.to_string(),
            "The host refused the connection"
        );
        assert_eq!(ClientError::Closed.to_string(), "Chat client is closed");
    }
}
