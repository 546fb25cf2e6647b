//! A small threaded HTTP/1.0 server. Every accepted connection carries exactly one request and
//! one response, handled off the accept loop so acceptance never waits on a handler.
//!
//! Users plug application behavior in by implementing `RequestHandler`; `EchoHandler` reflects
//! the request back.
//!
//! ```no_run
//! use http10::server::{EchoHandler, HttpServer, ServerConfig};
//!
//! let config = ServerConfig {
//!     port: 8080,
//!     workers: 4,
//!     ..ServerConfig::default()
//! };
//! let server = HttpServer::bind(&config, EchoHandler)?;
//! server.serve_forever()?;
//! # Ok::<(), http10::error::Error>(())
//! ```
use crate::error::{Error, Result};
use crate::protocol::{MessageReader, MessageWriter, Request, Response};
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use threadpool::ThreadPool;

pub const INVALID_REQUEST_BODY: &str = "Invalid request!";

/// Most bytes discarded after rejecting a malformed request.
pub const DRAIN_LIMIT: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Size of the handler pool. 0 spawns one thread per connection.
    pub workers: usize,
    /// Read and write deadline applied to every accepted connection.
    pub io_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            workers: 0,
            io_timeout: None,
        }
    }
}

/// A connection whose sending half can be closed while its receiving half stays open.
pub trait HalfClose {
    fn close_write(&mut self) -> io::Result<()>;
}

impl HalfClose for TcpStream {
    fn close_write(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

impl<T: HalfClose + ?Sized> HalfClose for &mut T {
    fn close_write(&mut self) -> io::Result<()> {
        (**self).close_write()
    }
}

/// Represents the ability to accept a new abstract connection.
pub trait Listen {
    type Stream: io::Read + io::Write + HalfClose + Send + 'static;
    fn accept(&self) -> Result<Self::Stream>;
}

/// A `TcpListener` that applies the configured deadline to what it accepts.
pub struct TcpAcceptor {
    listener: TcpListener,
    io_timeout: Option<Duration>,
}

impl TcpAcceptor {
    pub fn new(listener: TcpListener, io_timeout: Option<Duration>) -> Self {
        TcpAcceptor {
            listener,
            io_timeout,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Listen for TcpAcceptor {
    type Stream = TcpStream;

    fn accept(&self) -> Result<TcpStream> {
        let (stream, peer) = self.listener.accept().map_err(Error::Accept)?;
        debug!("accepted connection from {}", peer);
        if let Err(e) = stream
            .set_read_timeout(self.io_timeout)
            .and_then(|_| stream.set_write_timeout(self.io_timeout))
        {
            warn!("no deadline on connection from {}: {}", peer, e);
        }
        Ok(stream)
    }
}

/// Represents the ability to turn one parsed request into one response.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

/// Responds 200 with a body describing the request it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn handle(&self, request: &Request) -> Response {
        let body = format!(
            "Method: {}, Path: {}, Http version: {}, Body: {}",
            request.method(),
            request.path(),
            request.version(),
            String::from_utf8_lossy(request.body())
        );
        Response::new(200, body)
    }
}

/// Reads one request off `stream`, writes one response and drops the stream. A malformed
/// start line is answered with a 500; every other failure is returned without a response.
pub fn serve_connection<S, H>(mut stream: S, handler: &H) -> Result<()>
where
    S: io::Read + io::Write + HalfClose,
    H: RequestHandler + ?Sized,
{
    let (response, rejected) =
        match MessageReader::new(io::BufReader::new(&mut stream)).read_request() {
            Ok(request) => {
                debug!("{} {} {}", request.method(), request.path(), request.version());
                (handler.handle(&request), false)
            }
            Err(Error::MalformedStartLine(line)) => {
                warn!("rejecting malformed request line {:?}", line);
                (Response::new(500, INVALID_REQUEST_BODY), true)
            }
            Err(e) => return Err(e),
        };
    MessageWriter::new(&mut stream).write_response(&response)?;
    if rejected {
        discard_unread(&mut stream);
    }
    Ok(())
}

/// Half-closes `stream`, then reads and drops up to `DRAIN_LIMIT` bytes the peer already sent,
/// so closing with unread input does not reset the connection before the 500 is read.
fn discard_unread<S: io::Read + HalfClose>(stream: &mut S) {
    if let Err(e) = stream.close_write() {
        debug!("could not half-close rejected connection: {}", e);
        return;
    }
    match io::copy(&mut io::Read::take(&mut *stream, DRAIN_LIMIT), &mut io::sink()) {
        Ok(n) => debug!("discarded {} unread bytes", n),
        Err(e) => debug!("stopped discarding unread bytes: {}", e),
    }
}

enum Dispatcher {
    ThreadPerConnection,
    Pool(ThreadPool),
}

pub struct HttpServer<L: Listen, H: RequestHandler> {
    listener: L,
    handler: Arc<H>,
    dispatcher: Dispatcher,
    next_id: AtomicU64,
}

impl<H: RequestHandler> HttpServer<TcpAcceptor, H> {
    pub fn bind(config: &ServerConfig, handler: H) -> Result<Self> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr).map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;
        if let Ok(local) = listener.local_addr() {
            info!("listening on {}", local);
        }
        let acceptor = TcpAcceptor::new(listener, config.io_timeout);
        Ok(HttpServer::new(acceptor, handler).with_workers(config.workers))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<L: Listen, H: RequestHandler> HttpServer<L, H> {
    pub fn new(listener: L, handler: H) -> Self {
        HttpServer {
            listener,
            handler: Arc::new(handler),
            dispatcher: Dispatcher::ThreadPerConnection,
            next_id: AtomicU64::new(1),
        }
    }

    /// Bounds handler concurrency to `workers` threads. 0 keeps one thread per connection.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.dispatcher = match workers {
            0 => Dispatcher::ThreadPerConnection,
            n => Dispatcher::Pool(ThreadPool::with_name("http10-worker".into(), n)),
        };
        self
    }

    /// Accepts one connection and hands it off. Returns once the handoff is done, not once the
    /// request has been served.
    pub fn serve_one(&self) -> Result<()> {
        let stream = self.listener.accept()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.dispatch(id, stream);
        Ok(())
    }

    /// Runs `serve_one` until accepting fails.
    pub fn serve_forever(&self) -> Result<Infallible> {
        loop {
            if let Err(e) = self.serve_one() {
                error!("accept loop stopped: {}", e);
                return Err(e);
            }
        }
    }

    fn dispatch(&self, id: u64, stream: L::Stream) {
        let handler = Arc::clone(&self.handler);
        let job = move || match serve_connection(stream, &*handler) {
            Ok(()) => debug!("[conn {}] closed", id),
            Err(e) if e.is_protocol_error() => warn!("[conn {}] bad request: {}", id, e),
            Err(e) => error!("[conn {}] dropped: {}", id, e),
        };

        match &self.dispatcher {
            Dispatcher::ThreadPerConnection => {
                if let Err(e) = thread::Builder::new()
                    .name(format!("http10-conn-{}", id))
                    .spawn(job)
                {
                    error!("[conn {}] failed to spawn handler thread: {}", id, e);
                }
            }
            Dispatcher::Pool(pool) => pool.execute(job),
        }
    }
}

/// Serves the echo handler on every interface at `port` until accepting fails.
pub fn serve(port: u16) -> Result<Infallible> {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    HttpServer::bind(&config, EchoHandler)?.serve_forever()
}

#[cfg(test)]
pub fn test_server(workers: usize) -> Result<(u16, HttpServer<TcpAcceptor, EchoHandler>)> {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        workers,
        io_timeout: Some(Duration::from_secs(10)),
    };
    let server = HttpServer::bind(&config, EchoHandler)?;
    let port = server
        .local_addr()
        .map_err(|source| Error::Bind {
            addr: config.address(),
            source,
        })?
        .port();
    Ok((port, server))
}
