//! A one-shot HTTP/1.0 client: one connection, one GET request, one response.
//!
//! ```no_run
//! let (status, body) = http10::client::execute("http://localhost:8080/foo")?;
//! println!("{} {}", status, body);
//! # Ok::<(), http10::error::Error>(())
//! ```
use crate::error::{Error, Result};
use crate::protocol::{MessageReader, MessageWriter, Request, Response};
use crate::url::ParsedUrl;
use log::{debug, info};
use std::io;
use std::net::TcpStream;
use std::time::Duration;

/// Represents the ability to open a fresh byte stream to the server named by a url.
pub trait StreamConnector {
    type Stream: io::Read + io::Write;
    fn connect(&self, url: &ParsedUrl) -> Result<Self::Stream>;
}

/// Dials TCP, trying every address the host resolves to.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    io_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `timeout` to every read and write on the streams this connector opens.
    pub fn with_io_timeout(timeout: Option<Duration>) -> Self {
        TcpConnector {
            io_timeout: timeout,
        }
    }
}

impl StreamConnector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, url: &ParsedUrl) -> Result<TcpStream> {
        let err = |source| Error::Connection {
            addr: url.authority(),
            source,
        };
        let stream = TcpStream::connect((url.host(), url.port())).map_err(err)?;
        stream.set_read_timeout(self.io_timeout).map_err(err)?;
        stream.set_write_timeout(self.io_timeout).map_err(err)?;
        Ok(stream)
    }
}

pub struct HttpClient<C: StreamConnector = TcpConnector> {
    connector: C,
}

impl HttpClient<TcpConnector> {
    pub fn new() -> Self {
        HttpClient::with_connector(TcpConnector::new())
    }
}

impl Default for HttpClient<TcpConnector> {
    fn default() -> Self {
        HttpClient::new()
    }
}

impl<C: StreamConnector> HttpClient<C> {
    pub fn with_connector(connector: C) -> Self {
        HttpClient { connector }
    }

    /// Sends `request` over a new connection to `url` and reads back the response. The
    /// connection is dropped afterwards.
    pub fn send(&self, url: &ParsedUrl, request: &Request) -> Result<Response> {
        let mut stream = self.connector.connect(url)?;
        debug!("connected to {}", url.authority());

        MessageWriter::new(&mut stream).write_request(request)?;
        MessageReader::new(io::BufReader::new(&mut stream)).read_response()
    }

    /// GETs `url`, returning the response status and its body as text.
    pub fn execute(&self, url: &str) -> Result<(u16, String)> {
        let url = ParsedUrl::parse(url)?;
        let response = self.send(&url, &Request::get(&url))?;
        info!("GET {} -> {}", url, response.status());
        Ok((response.status(), response.body_text()))
    }
}

/// GETs `url` over plain TCP with no deadlines.
pub fn execute(url: &str) -> Result<(u16, String)> {
    HttpClient::new().execute(url)
}
