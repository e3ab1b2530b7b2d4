use std::io;

use thiserror::Error;

use crate::types::AlertDescription;

/// Errors surfaced by the record layer, the handshake and the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// A fatal condition detected locally. The alert is sent to the peer
    /// (best effort) before the connection is torn down.
    #[error("fatal alert {0}: {1}")]
    FatalAlert(AlertDescription, String),

    /// The peer sent us a fatal alert.
    #[error("received fatal alert {0}")]
    AlertReceived(AlertDescription),

    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The connection was closed, gracefully or after a failure.
    #[error("connection closed")]
    Closed,

    /// Caller supplied a receive buffer smaller than the pending record.
    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("datagram transport: {0}")]
    Io(#[from] io::Error),

    #[error("crypto: {0}")]
    CryptoError(String),

    #[error("configuration: {0}")]
    ConfigError(String),
}

impl Error {
    pub fn alert(description: AlertDescription, message: impl Into<String>) -> Self {
        Error::FatalAlert(description, message.into())
    }

    pub fn unexpected_message(message: impl Into<String>) -> Self {
        Self::alert(AlertDescription::UnexpectedMessage, message)
    }

    pub fn illegal_parameter(message: impl Into<String>) -> Self {
        Self::alert(AlertDescription::IllegalParameter, message)
    }

    pub fn handshake_failure(message: impl Into<String>) -> Self {
        Self::alert(AlertDescription::HandshakeFailure, message)
    }

    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::alert(AlertDescription::DecodeError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::alert(AlertDescription::InternalError, message)
    }

    /// The alert this error maps to when the handshake aborts on it.
    ///
    /// Errors that arrived as alerts from the peer return `None`: nothing is
    /// sent back for those.
    pub fn alert_description(&self) -> Option<AlertDescription> {
        match self {
            Error::FatalAlert(d, _) => Some(*d),
            Error::AlertReceived(_) => None,
            Error::Closed => None,
            _ => Some(AlertDescription::InternalError),
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let message = match value {
            nom::Err::Incomplete(_) => "incomplete message".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("malformed message ({:?})", e.code)
            }
        };
        Error::decode_error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_mapping() {
        assert_eq!(
            Error::illegal_parameter("x").alert_description(),
            Some(AlertDescription::IllegalParameter)
        );
        assert_eq!(
            Error::Timeout("handshake").alert_description(),
            Some(AlertDescription::InternalError)
        );
        assert_eq!(
            Error::AlertReceived(AlertDescription::HandshakeFailure).alert_description(),
            None
        );
    }

    #[test]
    fn nom_errors_are_decode_errors() {
        let input: &[u8] = &[1];
        let err: nom::Err<nom::error::Error<&[u8]>> = nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Eof,
        ));
        let e: Error = err.into();
        assert_eq!(e.alert_description(), Some(AlertDescription::DecodeError));
    }
}
