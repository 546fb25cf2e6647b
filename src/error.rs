use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("url must start with http://, got {0:?}")]
    InvalidUrl(String),

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("malformed start line {0:?}")]
    MalformedStartLine(String),

    #[error("invalid header: {0:?}")]
    MalformedHeader(String),

    #[error("invalid content length {0:?}")]
    InvalidContentLength(String),

    #[error("read invalid length {read}, expected {expected}")]
    TruncatedBody { read: usize, expected: usize },

    #[error("invalid status code {0:?}")]
    InvalidStatusCode(String),

    #[error("failed to connect to {addr}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read from connection")]
    ConnectionRead(#[source] io::Error),

    #[error("failed to write to connection")]
    ConnectionWrite(#[source] io::Error),

    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection")]
    Accept(#[source] io::Error),
}

pub type Result<R> = std::result::Result<R, Error>;

impl Error {
    /// True for the framing violations a peer can cause by sending bad bytes.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedStartLine(_)
                | Error::MalformedHeader(_)
                | Error::InvalidContentLength(_)
                | Error::TruncatedBody { .. }
                | Error::InvalidStatusCode(_)
        )
    }
}
