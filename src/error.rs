//! Error taxonomy for the window manager
//!
//! Most failures travel as `anyhow::Error`; [`WmError`] names the cases the
//! event loop has to tell apart.

use thiserror::Error;
use tracing::warn;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};

#[derive(Debug, Error)]
pub enum WmError {
    /// The X server connection is gone; nothing can continue
    #[error("connection to the X server was lost")]
    ConnectionLost,

    /// Server-side allocation (window, pixmap, GC) failed
    #[error("X server resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A request was rejected by the server
    #[error("protocol request failed: {0}")]
    Protocol(String),

    #[error("another window manager is already running (use --replace)")]
    AnotherWmRunning,
}

impl WmError {
    /// Whether an error means the display connection is unusable
    pub fn is_fatal(error: &anyhow::Error) -> bool {
        error.chain().any(|cause| {
            if let Some(WmError::ConnectionLost) = cause.downcast_ref::<WmError>() {
                return true;
            }
            if cause.downcast_ref::<ConnectionError>().is_some() {
                return true;
            }
            if let Some(ReplyError::ConnectionError(_)) = cause.downcast_ref::<ReplyError>() {
                return true;
            }
            matches!(
                cause.downcast_ref::<ReplyOrIdError>(),
                Some(ReplyOrIdError::ConnectionError(_))
            )
        })
    }

    /// Whether an error is a server allocation failure
    pub fn is_resource_exhausted(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<WmError>(),
            Some(WmError::ResourceExhausted(_))
        )
    }
}

/// Classify a failed allocation request. Only an error the server sent
/// back means the resource is unavailable; anything else is passed on so
/// connection loss stays fatal.
pub fn allocation_failed(what: &str, error: ReplyError) -> anyhow::Error {
    match error {
        ReplyError::X11Error(e) => WmError::ResourceExhausted(format!("{}: {:?}", what, e.error_kind)).into(),
        other => anyhow::Error::new(other).context(format!("allocating {}", what)),
    }
}

/// Log and swallow a non-fatal request failure. Connection loss is
/// returned so the caller can stop.
pub fn best_effort(what: &str, result: anyhow::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if WmError::is_fatal(&e) => Err(e),
        Err(e) => {
            warn!("{} failed: {:#}", what, e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use x11rb::protocol::ErrorKind;
    use x11rb::x11_utils::X11Error;

    #[test]
    fn test_connection_errors_are_fatal() {
        let err: anyhow::Error = ConnectionError::UnknownError.into();
        assert!(WmError::is_fatal(&err));

        let wrapped = Err::<(), _>(ConnectionError::UnknownError)
            .context("configure frame")
            .unwrap_err();
        assert!(WmError::is_fatal(&wrapped));

        let lost: anyhow::Error = WmError::ConnectionLost.into();
        assert!(WmError::is_fatal(&lost));
    }

    #[test]
    fn test_protocol_errors_are_not_fatal() {
        let err: anyhow::Error = WmError::Protocol("BadWindow".into()).into();
        assert!(!WmError::is_fatal(&err));
        assert!(best_effort("set property", Err(err)).is_ok());

        let exhausted: anyhow::Error = WmError::ResourceExhausted("pixmap".into()).into();
        assert!(WmError::is_resource_exhausted(&exhausted));
        assert!(!WmError::is_fatal(&exhausted));
    }

    #[test]
    fn test_allocation_failure_classification() {
        let refused = ReplyError::X11Error(X11Error {
            error_kind: ErrorKind::Alloc,
            error_code: 11,
            sequence: 0,
            bad_value: 0,
            minor_opcode: 0,
            major_opcode: 53,
            extension_name: None,
            request_name: Some("CreatePixmap"),
        });
        let err = allocation_failed("pixmap", refused);
        assert!(WmError::is_resource_exhausted(&err));
        assert!(!WmError::is_fatal(&err));

        let lost = allocation_failed(
            "pixmap",
            ReplyError::ConnectionError(ConnectionError::UnknownError),
        );
        assert!(!WmError::is_resource_exhausted(&lost));
        assert!(WmError::is_fatal(&lost));
    }

    #[test]
    fn test_best_effort_propagates_connection_loss() {
        let err: anyhow::Error = ConnectionError::UnknownError.into();
        assert!(best_effort("flush", Err(err)).is_err());
    }
}
