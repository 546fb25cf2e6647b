//! A minimal HTTP/1.0 message engine with a one-shot client and a threaded server.
//!
//! See the `protocol` module for message reading and writing.
//! See the `client` module for HTTP client code.
//! See the `server` module for HTTP server code.
//! See the `url` module for splitting request urls.

pub mod client;
pub mod server;

pub mod error;
pub mod protocol;
pub mod url;
