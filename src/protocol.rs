//! HTTP/1.0 message framing shared by the client and the server.
//!
//! A message is a three-token start line, a header section terminated by a blank line and a
//! body whose length is given by the `Content-Length` header. There is no chunked or
//! read-until-close body mode.
use crate::error::{Error, Result};
use crate::url::ParsedUrl;
use hashbrown::HashMap;
use log::debug;
use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::str;

pub const HTTP_VERSION: &str = "HTTP/1.0";

/// Every response carries this reason phrase, whatever its status.
pub const REASON_PHRASE: &str = "Woot";

const CONTENT_LENGTH: &str = "content-length";
const HEADER_SEPARATOR: &str = ": ";
const CRLF: &str = "\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartLine {
    tokens: [String; 3],
}

impl StartLine {
    pub fn new<A: Into<String>, B: Into<String>, C: Into<String>>(a: A, b: B, c: C) -> Self {
        StartLine {
            tokens: [a.into(), b.into(), c.into()],
        }
    }

    pub fn tokens(&self) -> (&str, &str, &str) {
        let [a, b, c] = &self.tokens;
        (a.as_str(), b.as_str(), c.as_str())
    }
}

impl str::FromStr for StartLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens[..] {
            [a, b, c] => Ok(StartLine::new(a, b, c)),
            _ => Err(Error::MalformedStartLine(s.into())),
        }
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (a, b, c) = self.tokens();
        write!(f, "{} {} {}", a, b, c)
    }
}

#[cfg(test)]
mod start_line_tests {
    use super::StartLine;
    use crate::error::Error;

    #[test]
    fn parse_success() {
        let line: StartLine = "GET /foo HTTP/1.0".parse().unwrap();
        assert_eq!(line.tokens(), ("GET", "/foo", "HTTP/1.0"));

        let line: StartLine = "HTTP/1.0  200\tWoot ".parse().unwrap();
        assert_eq!(line.tokens(), ("HTTP/1.0", "200", "Woot"));
    }

    #[test]
    fn parse_wrong_token_count() {
        for input in &["", "GET", "GET /foo", "HTTP/1.0 404 Not Found"] {
            assert!(
                matches!(input.parse::<StartLine>(), Err(Error::MalformedStartLine(ref l)) if l == *input),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            &StartLine::new("HTTP/1.0", "500", "Woot").to_string(),
            "HTTP/1.0 500 Woot"
        );
    }
}

/// Header names folded to lower case, mapped to trimmed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Headers {
            headers: HashMap::new(),
        }
    }

    /// Builds the header map from the lines of a header section, blank terminator excluded.
    /// A repeated name keeps its last value.
    pub fn from_lines<I: IntoIterator<Item = Result<String>>>(lines: I) -> Result<Self> {
        let mut headers = Headers::new();
        for line in lines {
            let line = line?;
            let (name, value) = parse_header_line(&line)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name.to_lowercase().as_str())
            .map(String::as_str)
    }

    pub fn insert<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.as_ref().trim().to_owned());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// The declared body length. An absent or empty header means no body.
    pub fn content_length(&self) -> Result<usize> {
        match self.get(CONTENT_LENGTH) {
            None | Some("") => Ok(0),
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| Error::InvalidContentLength(value.into())),
        }
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

fn parse_header_line(line: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = line.split(HEADER_SEPARATOR).collect();
    match parts[..] {
        [name, value] => Ok((name, value)),
        _ => Err(Error::MalformedHeader(line.into())),
    }
}

/// `content-type` -> `Content-Type`
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}


/// A start line, its headers and its body, before any interpretation of the start line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub start_line: StartLine,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    version: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Request {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Request {
            method: method.into(),
            path: path.into(),
            version: HTTP_VERSION.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: &ParsedUrl) -> Self {
        let mut request = Request::new("GET", url.path());
        request.add_header("Host", url.host());
        request
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn add_header<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        self.headers.insert(key, value);
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn start_line(&self) -> StartLine {
        StartLine::new(
            self.method.as_str(),
            self.path.as_str(),
            self.version.as_str(),
        )
    }
}

impl From<Message> for Request {
    fn from(message: Message) -> Self {
        let StartLine {
            tokens: [method, path, version],
        } = message.start_line;
        Request {
            method,
            path,
            version,
            headers: message.headers,
            body: message.body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: String,
    status: u16,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new<B: Into<Vec<u8>>>(status: u16, body: B) -> Self {
        Response {
            version: HTTP_VERSION.into(),
            status,
            reason: REASON_PHRASE.into(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn add_header<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        self.headers.insert(key, value);
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn start_line(&self) -> StartLine {
        StartLine::new(
            self.version.as_str(),
            self.status.to_string(),
            self.reason.as_str(),
        )
    }
}

impl TryFrom<Message> for Response {
    type Error = Error;

    fn try_from(message: Message) -> Result<Self> {
        let StartLine {
            tokens: [version, status, reason],
        } = message.start_line;
        let status = status
            .parse::<u16>()
            .map_err(|_| Error::InvalidStatusCode(status.clone()))?;
        Ok(Response {
            version,
            status,
            reason,
            headers: message.headers,
            body: message.body,
        })
    }
}

/// Reads messages off a buffered stream. It consumes exactly the bytes of the message it
/// reads, so the stream must not be read around it.
pub struct MessageReader<R> {
    stream: R,
}

impl<R: BufRead> MessageReader<R> {
    pub fn new(stream: R) -> Self {
        MessageReader { stream }
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        self.stream
            .read_until(b'\n', &mut line)
            .map_err(Error::ConnectionRead)?;
        if line.pop() != Some(b'\n') {
            return Err(Error::ConnectionRead(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end of line",
            )));
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    pub fn read_start_line(&mut self) -> Result<StartLine> {
        let line = self.read_line()?;
        debug!("start line {:?}", line);
        line.parse()
    }

    pub fn read_headers(&mut self) -> Result<Headers> {
        let headers = Headers::from_lines(HeaderLines {
            reader: self,
            done: false,
        })?;
        debug!("read {} headers", headers.len());
        Ok(headers)
    }

    pub fn read_body(&mut self, headers: &Headers) -> Result<Vec<u8>> {
        let expected = headers.content_length()?;
        let mut body = Vec::new();
        let read = (&mut self.stream)
            .take(expected as u64)
            .read_to_end(&mut body)
            .map_err(Error::ConnectionRead)?;
        if read < expected {
            return Err(Error::TruncatedBody { read, expected });
        }
        debug!("read body of {} bytes", read);
        Ok(body)
    }

    pub fn read_message(&mut self) -> Result<Message> {
        let start_line = self.read_start_line()?;
        let headers = self.read_headers()?;
        let body = self.read_body(&headers)?;
        Ok(Message {
            start_line,
            headers,
            body,
        })
    }

    pub fn read_request(&mut self) -> Result<Request> {
        Ok(self.read_message()?.into())
    }

    pub fn read_response(&mut self) -> Result<Response> {
        Response::try_from(self.read_message()?)
    }
}

/// The lines of a header section. Ends at the first blank line or after the first error.
struct HeaderLines<'a, R> {
    reader: &'a mut MessageReader<R>,
    done: bool,
}

impl<R: BufRead> Iterator for HeaderLines<'_, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        if self.done {
            return None;
        }
        match self.reader.read_line() {
            Ok(line) if line.trim().is_empty() => {
                self.done = true;
                None
            }
            Ok(line) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}


/// Serializes messages onto a buffered sink. Nothing is visible to the peer until a write
/// method returns, since each one ends with a flush.
pub struct MessageWriter<W: Write> {
    stream: io::BufWriter<W>,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(stream: W) -> Self {
        MessageWriter {
            stream: io::BufWriter::new(stream),
        }
    }

    /// Writes the start line, the headers, a `Content-Length` header when the body is not
    /// empty, the blank line and the body. A `content-length` in `headers` is ignored in favour
    /// of the real body length.
    pub fn write_message(
        &mut self,
        start_line: &StartLine,
        headers: &Headers,
        body: &[u8],
    ) -> Result<()> {
        self.write_message_inner(start_line, headers, body)
            .map_err(Error::ConnectionWrite)?;
        debug!("wrote {:?} with {} body bytes", start_line.to_string(), body.len());
        Ok(())
    }

    fn write_message_inner(
        &mut self,
        start_line: &StartLine,
        headers: &Headers,
        body: &[u8],
    ) -> io::Result<()> {
        write!(self.stream, "{}{}", start_line, CRLF)?;

        let mut headers: Vec<(&str, &str)> = headers
            .iter()
            .filter(|(name, _)| *name != CONTENT_LENGTH)
            .collect();
        headers.sort();
        for (name, value) in headers {
            write!(
                self.stream,
                "{}{}{}{}",
                canonical_name(name),
                HEADER_SEPARATOR,
                value,
                CRLF
            )?;
        }

        if !body.is_empty() {
            write!(self.stream, "Content-Length: {}{}", body.len(), CRLF)?;
        }
        self.stream.write_all(CRLF.as_bytes())?;
        self.stream.write_all(body)?;
        self.stream.flush()
    }

    pub fn write_request(&mut self, request: &Request) -> Result<()> {
        self.write_message(&request.start_line(), request.headers(), request.body())
    }

    pub fn write_response(&mut self, response: &Response) -> Result<()> {
        self.write_message(&response.start_line(), response.headers(), response.body())
    }
}

#[cfg(test)]
mod message_writer_tests {
    use super::{Headers, MessageReader, MessageWriter, Request, Response, StartLine};
    use crate::error::Error;
    use crate::url::ParsedUrl;
    use std::io;

    fn written<F: FnOnce(&mut MessageWriter<&mut Vec<u8>>)>(f: F) -> String {
        let mut out = Vec::new();
        f(&mut MessageWriter::new(&mut out));
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn write_response_with_body() {
        let out = written(|w| w.write_response(&Response::new(200, "hello")).unwrap());
        assert_eq!(&out, "HTTP/1.0 200 Woot\r\nContent-Length: 5\r\n\r\nhello");
    }

    #[test]
    fn write_response_without_body() {
        let out = written(|w| w.write_response(&Response::new(204, "")).unwrap());
        assert_eq!(&out, "HTTP/1.0 204 Woot\r\n\r\n");
    }

    #[test]
    fn write_get_request() {
        let url = ParsedUrl::parse("http://example.com:8080/a/b").unwrap();
        let out = written(|w| w.write_request(&Request::get(&url)).unwrap());
        assert_eq!(&out, "GET /a/b HTTP/1.0\r\nHost: example.com\r\n\r\n");
    }

    #[test]
    fn write_request_with_body() {
        let mut request = Request::new("POST", "/submit").with_body("a=1");
        request.add_header("host", "example.com");
        let out = written(|w| w.write_request(&request).unwrap());
        assert_eq!(
            &out,
            "POST /submit HTTP/1.0\r\nHost: example.com\r\nContent-Length: 3\r\n\r\na=1"
        );
    }

    #[test]
    fn content_length_uses_byte_length() {
        let out = written(|w| w.write_response(&Response::new(200, "héllo")).unwrap());
        assert!(out.contains("Content-Length: 6\r\n"));
    }

    #[test]
    fn caller_content_length_is_replaced() {
        let mut response = Response::new(200, "abc");
        response.add_header("Content-Length", "99");
        response.add_header("x-b", "2");
        response.add_header("X-A", "1");
        let out = written(|w| w.write_response(&response).unwrap());
        assert_eq!(
            &out,
            "HTTP/1.0 200 Woot\r\nX-A: 1\r\nX-B: 2\r\nContent-Length: 3\r\n\r\nabc"
        );
    }

    #[test]
    fn round_trip() {
        let start_line = StartLine::new("PUT", "/upload", "HTTP/1.0");
        let headers: Headers = vec![("Host", "example.com"), ("X-Token", "abc")]
            .into_iter()
            .collect();
        let body = b"\x00binary\r\n\r\nbody".to_vec();

        let mut wire = Vec::new();
        MessageWriter::new(&mut wire)
            .write_message(&start_line, &headers, &body)
            .unwrap();
        let message = MessageReader::new(&wire[..]).read_message().unwrap();

        assert_eq!(message.start_line, start_line);
        assert_eq!(message.body, body);
        for (name, value) in headers.iter() {
            assert_eq!(message.headers.get(name), Some(value));
        }
        assert_eq!(message.headers.content_length().unwrap(), body.len());
    }

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn write_failure() {
        let result = MessageWriter::new(BrokenPipe).write_response(&Response::new(200, "x"));
        assert!(matches!(result, Err(Error::ConnectionWrite(_))));
    }
}
