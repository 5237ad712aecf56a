use std::io;

use thiserror::Error;

use crate::block::BlockError;

use super::{ServerCode, ServerException, TransportError};

/// The byte stream no longer matches what the protocol allows at this point.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown server packet code {0}")]
    UnknownPacket(u64),

    #[error("expected {expected}, received {received:?} packet")]
    UnexpectedPacket {
        expected: &'static str,
        received: ServerCode,
    },

    #[error("unsupported column type '{0}'")]
    UnknownColumnType(String),

    #[error("unknown block info field {0}")]
    UnknownBlockInfoField(u64),

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("invalid block: {0}")]
    Block(#[from] BlockError),
}

/// Error returned at the public call boundary of a [`Connection`](super::Connection).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect, read or write failure, or a truncated stream. The connection is unusable.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// Unknown packet, unresolvable column type or malformed framing. The connection is
    /// unusable.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Exception chain reported by the server.
    #[error("server exception: {0}")]
    Server(#[from] ServerException),

    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<ClientError>),

    #[error("a previous response has not been fully received")]
    Busy,

    #[error("connection is closed")]
    Disconnected,
}

impl ClientError {
    /// The server exception carried by this error, looking through handshake wrapping.
    pub fn server_exception(&self) -> Option<&ServerException> {
        match self {
            ClientError::Server(e) => Some(e),
            ClientError::Handshake(inner) => inner.server_exception(),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Malformed(reason) => {
                ClientError::Protocol(ProtocolError::Malformed(reason))
            }
            other => ClientError::Transport(other),
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        TransportError::from(value).into()
    }
}
